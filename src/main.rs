use clap::Parser;
use colored::*;
use semtest::types::RunSummary;
use semtest::{AnvilEnvironment, SemanticTest, SemanticTestError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const LINE_PREFIX: &str = "  ";

#[derive(Parser)]
#[command(name = "semtest")]
#[command(about = "Runs Solidity semantic tests against an Anvil node")]
#[command(version)]
struct Cli {
    /// Path to a semantic test file or a directory of them
    #[arg(short, long)]
    input: String,

    /// JSON-RPC endpoint of the node (falls back to SEMTEST_RPC_URL, then http://localhost:8545)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Rewrite failing test files with the obtained results
    #[arg(long)]
    accept: bool,

    /// Print the contract source of failing tests
    #[arg(long)]
    show_source: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let input_path = Path::new(&cli.input);
    let test_files = if input_path.is_file() {
        vec![input_path.to_path_buf()]
    } else if input_path.is_dir() {
        find_test_files(input_path)
    } else {
        error!("Input path does not exist: {}", cli.input);
        return Err("Invalid input path".into());
    };

    let rpc_url = cli
        .rpc_url
        .clone()
        .or_else(|| std::env::var("SEMTEST_RPC_URL").ok())
        .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
    let mut env = AnvilEnvironment::connect(&rpc_url)?;

    let mut summary = RunSummary::default();
    for path in &test_files {
        match run_file(&cli, &mut env, path) {
            Ok(true) => {
                println!("{} {}", "✅".green(), path.display());
                summary.total_passed += 1;
            }
            Ok(false) => {
                println!("{} {}", "❌".red(), path.display());
                summary.total_failed += 1;
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                summary.total_errored += 1;
            }
        }
    }

    if test_files.len() > 1 {
        println!("\n🏁 Semantic test summary:");
        println!("   ✅ {} passed", summary.total_passed);
        println!("   ❌ {} failed", summary.total_failed);
        if summary.total_errored > 0 {
            println!("   ⚠️  {} could not be run", summary.total_errored);
        }
        println!("   📊 Total: {} test files", test_files.len());
    }

    let unsuccessful = summary.total_failed + summary.total_errored;
    if unsuccessful > 0 {
        return Err(format!("{} of {} test file(s) did not pass", unsuccessful, test_files.len()).into());
    }
    Ok(())
}

fn run_file(cli: &Cli, env: &mut AnvilEnvironment, path: &Path) -> Result<bool, SemanticTestError> {
    let mut test = SemanticTest::from_file(path)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let passed = test.run(env, &mut out, LINE_PREFIX, !cli.no_color)?;

    if !passed {
        if cli.show_source {
            writeln!(out, "{}Contract:", LINE_PREFIX)?;
            test.print_source(&mut out, LINE_PREFIX)?;
        }
        if cli.accept {
            fs::write(path, test.updated_file_contents()?)?;
            info!("Updated expectations in {}", path.display());
        }
    }
    Ok(passed)
}

fn find_test_files(dir_path: &Path) -> Vec<PathBuf> {
    let mut test_files: Vec<PathBuf> = WalkDir::new(dir_path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|s| s == "sol").unwrap_or(false))
        .map(|e| e.into_path())
        .collect();
    test_files.sort();
    test_files
}
