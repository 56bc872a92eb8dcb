use anyhow::{Context, Result};
use ethers::abi::Abi;
use serde_json::Value;
use solang_parser::pt::{ContractTy, SourceUnitPart};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// File name the source is written to before compilation.
const SOURCE_FILE: &str = "SemanticTest.sol";

#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub name: String,
    pub bytecode: Vec<u8>,
    pub abi: Abi,
}

/// Contract compiler using forge or solc
pub struct ContractCompiler {
    /// Path to forge executable (if available)
    forge_path: Option<String>,
    /// Path to solc executable (if available)
    solc_path: Option<String>,
}

impl ContractCompiler {
    pub fn new() -> Self {
        let forge_path = Self::find_executable("forge");
        let solc_path = Self::find_executable("solc");

        if forge_path.is_none() && solc_path.is_none() {
            warn!("Neither 'forge' nor 'solc' found in PATH. Contract compilation will fail.");
            warn!("Install Foundry: curl -L https://foundry.paradigm.xyz | bash && foundryup");
            warn!("Or install solc: https://docs.soliditylang.org/en/latest/installing-solidity.html");
        }

        Self { forge_path, solc_path }
    }

    /// Compile `source` and return the last contract it declares.
    pub fn compile_source(&self, source: &str) -> Result<CompiledContract> {
        let contract_name = last_contract_name(source)?;

        let temp_dir = std::env::temp_dir().join(format!("semtest_compile_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(temp_dir.join("src"))?;
        std::fs::write(temp_dir.join("src").join(SOURCE_FILE), source)?;

        let compiled = self.compile_in(&temp_dir, &contract_name);
        let _ = std::fs::remove_dir_all(&temp_dir);
        let (bytecode, abi) = compiled?;

        Ok(CompiledContract {
            name: contract_name,
            bytecode,
            abi,
        })
    }

    fn compile_in(&self, project_dir: &Path, contract_name: &str) -> Result<(Vec<u8>, Abi)> {
        // Prefer forge if available (Foundry's compiler)
        if let Some(ref forge) = self.forge_path {
            return self.compile_with_forge(project_dir, contract_name, forge);
        }

        if let Some(ref solc) = self.solc_path {
            return self.compile_with_solc(project_dir, contract_name, solc);
        }

        Err(anyhow::anyhow!("No compiler available. Install Foundry (forge) or solc."))
    }

    fn compile_with_forge(&self, project_dir: &Path, contract_name: &str, forge_path: &str) -> Result<(Vec<u8>, Abi)> {
        debug!("Compiling {} with forge", contract_name);

        let output = Command::new(forge_path)
            .args(["build", "--force", "--root"])
            .arg(project_dir)
            .output()
            .context("Failed to execute forge build")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(anyhow::anyhow!("Forge compilation failed:\nSTDOUT: {}\nSTDERR: {}", stdout, stderr));
        }

        // Forge artifact path: out/<File>.sol/<Contract>.json
        let artifact_path = project_dir
            .join("out")
            .join(SOURCE_FILE)
            .join(format!("{}.json", contract_name));
        let artifact_content = std::fs::read_to_string(&artifact_path)
            .with_context(|| format!("Compiled artifact not found at: {:?}", artifact_path))?;
        let artifact: Value = serde_json::from_str(&artifact_content).context("Failed to parse forge artifact JSON")?;

        let bytecode_hex = artifact
            .get("bytecode")
            .and_then(|v| v.get("object"))
            .and_then(|v| v.as_str())
            .or_else(|| artifact.get("bytecode").and_then(|v| v.as_str()))
            .context("Bytecode not found in artifact")?;

        let abi_value = artifact.get("abi").context("ABI not found in artifact")?;
        let abi: Abi = serde_json::from_value(abi_value.clone()).context("Failed to parse ABI")?;

        let bytecode = hex::decode(bytecode_hex.strip_prefix("0x").unwrap_or(bytecode_hex))?;
        Ok((bytecode, abi))
    }

    fn compile_with_solc(&self, project_dir: &Path, contract_name: &str, solc_path: &str) -> Result<(Vec<u8>, Abi)> {
        debug!("Compiling {} with solc", contract_name);

        let output = Command::new(solc_path)
            .args(["--combined-json", "bin,abi", SOURCE_FILE])
            .current_dir(project_dir.join("src"))
            .output()
            .context("Failed to execute solc")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!("Solc compilation failed: {}", stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: Value = serde_json::from_str(&stdout).context("Failed to parse solc JSON output")?;
        let contracts = json.get("contracts").context("No 'contracts' in solc output")?;

        // Keys look like "<file>:<Contract>"
        let contract_key = format!("{}:{}", SOURCE_FILE, contract_name);
        let contract = contracts
            .get(&contract_key)
            .with_context(|| format!("Contract {} not found in compilation output", contract_name))?;

        let bytecode_hex = contract
            .get("bin")
            .and_then(|v| v.as_str())
            .context("Bytecode not found in contract")?;

        // Older solc versions emit the ABI as a JSON string, newer ones inline it.
        let abi: Abi = match contract.get("abi").context("ABI not found in contract")? {
            Value::String(abi_str) => serde_json::from_str(abi_str),
            other => serde_json::from_value(other.clone()),
        }
        .context("Failed to parse ABI")?;

        let bytecode = hex::decode(bytecode_hex)?;
        Ok((bytecode, abi))
    }

    /// Find an executable in PATH
    fn find_executable(name: &str) -> Option<String> {
        let output = Command::new("which").arg(name).output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8(output.stdout).ok().map(|path| path.trim().to_string())
    }
}

impl Default for ContractCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of the last `contract` defined in `source`, the one a test deploys.
pub fn last_contract_name(source: &str) -> Result<String> {
    match solang_parser::parse(source, 0) {
        Ok((unit, _comments)) => unit
            .0
            .iter()
            .filter_map(|part| match part {
                SourceUnitPart::ContractDefinition(def) if matches!(def.ty, ContractTy::Contract(_)) => {
                    def.name.as_ref().map(|id| id.name.clone())
                }
                _ => None,
            })
            .last()
            .context("No contract definition found in source"),
        Err(diagnostics) => {
            let messages: Vec<String> = diagnostics.into_iter().map(|d| d.message).collect();
            warn!("Solidity parser rejected the source ({}), scanning for contracts line by line", messages.join("; "));
            scan_contract_names(source)
                .pop()
                .context("No contract definition found in source")
        }
    }
}

fn scan_contract_names(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| line.trim().strip_prefix("contract "))
        .filter_map(|rest| rest.split(|c: char| c.is_whitespace() || c == '{').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
