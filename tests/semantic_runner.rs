//! Runner tests against a scripted in-memory execution environment.

use anyhow::Result;
use ethers::types::U256;
use semtest::execution::ExecutionEnvironment;
use semtest::formatting::{Highlighter, Style};
use semtest::types::ExecutionOutput;
use semtest::{SemanticTest, SemanticTestError};
use std::collections::VecDeque;
use std::io::Write;

/// Replays canned responses and records every request it sees.
struct ScriptedEnvironment {
    deploy_result: ExecutionOutput,
    responses: VecDeque<ExecutionOutput>,
    deployed_sources: Vec<String>,
    calls: Vec<(String, U256, Vec<u8>)>,
}

impl ScriptedEnvironment {
    fn new(responses: Vec<ExecutionOutput>) -> Self {
        Self {
            deploy_result: ExecutionOutput {
                output: vec![0x60, 0x80],
                success: true,
            },
            responses: responses.into(),
            deployed_sources: Vec::new(),
            calls: Vec::new(),
        }
    }
}

impl ExecutionEnvironment for ScriptedEnvironment {
    fn deploy(&mut self, source: &str, value: U256, constructor_args: &[u8]) -> Result<ExecutionOutput> {
        assert!(value.is_zero());
        assert!(constructor_args.is_empty());
        self.deployed_sources.push(source.to_string());
        Ok(self.deploy_result.clone())
    }

    fn call(&mut self, signature: &str, value: U256, arguments: &[u8]) -> Result<ExecutionOutput> {
        self.calls.push((signature.to_string(), value, arguments.to_vec()));
        self.responses
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("unexpected call to {}", signature))
    }
}

struct Markers;

impl Highlighter for Markers {
    fn paint(&self, text: &str, style: Style) -> String {
        match style {
            Style::Mismatch => format!("<<{}>>", text),
            _ => text.to_string(),
        }
    }
}

const TEST_FILE: &str = "\
contract C {
    uint x;
    function set(uint v) public { x = v; }
    function get() public view returns (uint) { return x; }
    function pay() public payable returns (uint) { return msg.value; }
}
// ----
// set(uint256): 1 ->
// get() -> 1
// pay(), 5 ether -> 5
";

fn word(value: u8) -> Vec<u8> {
    let mut bytes = vec![0u8; 32];
    bytes[31] = value;
    bytes
}

fn ok(output: Vec<u8>) -> ExecutionOutput {
    ExecutionOutput { output, success: true }
}

fn reverted() -> ExecutionOutput {
    ExecutionOutput {
        output: Vec::new(),
        success: false,
    }
}

#[test]
fn passing_run_writes_nothing() {
    let mut test = SemanticTest::parse(TEST_FILE).unwrap();
    let mut env = ScriptedEnvironment::new(vec![ok(vec![]), ok(word(1)), ok(word(5))]);
    let mut out = Vec::new();

    assert!(test.run(&mut env, &mut out, "", false).unwrap());
    assert!(out.is_empty());

    assert_eq!(env.deployed_sources, vec![test.source().to_string()]);
    let signatures: Vec<&str> = env.calls.iter().map(|(s, _, _)| s.as_str()).collect();
    assert_eq!(signatures, vec!["set(uint256)", "get()", "pay()"]);
    assert_eq!(env.calls[0].2, word(1));
    assert_eq!(env.calls[2].1, U256::from(5u64));
    assert!(test.tests().iter().all(|t| t.matches_expectation()));
}

#[test]
fn mismatch_reports_every_call_and_highlights_the_culprit() {
    let mut test = SemanticTest::parse(TEST_FILE).unwrap();
    let mut env = ScriptedEnvironment::new(vec![ok(vec![]), ok(word(2)), ok(word(5))]);
    let mut out = Vec::new();

    let passed = test.run_with(&mut env, &mut out, "  ", &Markers).unwrap();
    assert!(!passed);
    // A mismatch does not stop later calls.
    assert_eq!(env.calls.len(), 3);

    let report = String::from_utf8(out).unwrap();
    let expected = concat!(
        "  Expected result:\n",
        "  // set(uint256): 1 -> \n",
        "  // get() -> <<1>>\n",
        "  // pay(), 5 ether -> 5\n",
        "  Obtained result:\n",
        "  // set(uint256): 1 -> \n",
        "  // get() -> <<2>>\n",
        "  // pay(), 5 ether -> 5\n",
        "  Attention: Updates on the test will apply the detected format displayed.\n",
    );
    assert_eq!(report, expected);
}

#[test]
fn unexpected_revert_is_a_mismatch() {
    let mut test = SemanticTest::parse(TEST_FILE).unwrap();
    let mut env = ScriptedEnvironment::new(vec![ok(vec![]), reverted(), ok(word(5))]);
    let mut out = Vec::new();

    assert!(!test.run_with(&mut env, &mut out, "", &Markers).unwrap());
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("// get() -> <<FAILURE>>"));
    assert_eq!(test.tests().get(1).unwrap().failure(), Some(true));
}

#[test]
fn expected_failure_passes_when_the_call_reverts() {
    let file = "contract C {}\n// ----\n// f() -> FAILURE\n";
    let mut test = SemanticTest::parse(file).unwrap();
    let mut env = ScriptedEnvironment::new(vec![reverted()]);
    let mut out = Vec::new();

    assert!(test.run(&mut env, &mut out, "", false).unwrap());

    // Succeeding with the expected (empty) bytes still breaks the failure polarity.
    let mut env = ScriptedEnvironment::new(vec![ok(vec![])]);
    assert!(!test.run(&mut env, &mut out, "", false).unwrap());
}

#[test]
fn failed_deployment_aborts_before_any_call() {
    let mut test = SemanticTest::parse(TEST_FILE).unwrap();
    let mut env = ScriptedEnvironment::new(Vec::new());
    env.deploy_result = ExecutionOutput {
        output: Vec::new(),
        success: true,
    };
    let mut out = Vec::new();

    let err = test.run(&mut env, &mut out, "", false).unwrap_err();
    assert!(matches!(err, SemanticTestError::Deployment));
    assert_eq!(err.to_string(), "Failed to deploy contract.");
    assert!(env.calls.is_empty());
}

#[test]
fn environment_errors_are_fatal() {
    let mut test = SemanticTest::parse(TEST_FILE).unwrap();
    // Only one response scripted; the second call errors out.
    let mut env = ScriptedEnvironment::new(vec![ok(vec![])]);
    let mut out = Vec::new();

    let err = test.run(&mut env, &mut out, "", false).unwrap_err();
    assert!(matches!(err, SemanticTestError::Execution(_)));
    assert!(err.to_string().contains("unexpected call to get()"));
}

#[test]
fn rerun_replaces_previous_outcomes() {
    let mut test = SemanticTest::parse(TEST_FILE).unwrap();
    let mut out = Vec::new();

    let mut env = ScriptedEnvironment::new(vec![ok(vec![]), ok(word(9)), ok(word(5))]);
    assert!(!test.run(&mut env, &mut out, "", false).unwrap());

    let mut env = ScriptedEnvironment::new(vec![ok(vec![]), ok(word(1)), ok(word(5))]);
    assert!(test.run(&mut env, &mut out, "", false).unwrap());
    assert_eq!(test.tests().get(1).unwrap().raw_bytes(), word(1).as_slice());
}

#[test]
fn accepted_output_round_trips_into_a_passing_file() {
    let mut test = SemanticTest::parse(TEST_FILE).unwrap();
    let mut env = ScriptedEnvironment::new(vec![ok(vec![]), ok(word(7)), reverted()]);
    let mut out = Vec::new();
    assert!(!test.run(&mut env, &mut out, "", false).unwrap());

    let updated = test.updated_file_contents().unwrap();
    assert!(updated.starts_with("contract C {"));
    assert!(updated.contains("// ----\n// set(uint256): 1 -> \n// get() -> 7\n// pay(), 5 ether -> FAILURE\n"));

    let mut accepted = SemanticTest::parse(&updated).unwrap();
    let mut env = ScriptedEnvironment::new(vec![ok(vec![]), ok(word(7)), reverted()]);
    assert!(accepted.run(&mut env, &mut out, "", false).unwrap());
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.sol");
    let err = SemanticTest::from_file(&path).unwrap_err();
    assert!(matches!(err, SemanticTestError::Open { .. }));
    assert!(err.to_string().starts_with("Cannot open test contract:"));
}

#[test]
fn loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TEST_FILE.as_bytes()).unwrap();
    let test = SemanticTest::from_file(file.path()).unwrap();
    assert_eq!(test.tests().len(), 3);
}

#[test]
fn sample_file_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testdata/simple_storage.sol");
    let test = SemanticTest::from_file(&path).unwrap();
    assert_eq!(test.tests().len(), 8);

    let calls = test.tests().calls();
    assert_eq!(calls[3].expectations.raw_bytes.len(), 64);
    assert_eq!(calls[4].expectations.raw_bytes, vec![0xff; 31].into_iter().chain([0xfd]).collect::<Vec<u8>>());
    assert!(calls[5].expectations.failure);
    assert_eq!(calls[7].value, U256::from(1000u64));

    let mut updated = Vec::new();
    test.print_source(&mut updated, "").unwrap();
    assert!(String::from_utf8(updated).unwrap().contains("contract SimpleStorage"));
}
