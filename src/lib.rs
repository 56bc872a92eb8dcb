//! Semantic test harness for Solidity contracts.
//!
//! A test file holds a contract followed by `// ----` and a list of declared
//! calls with their expected results. The harness deploys the contract, runs
//! every call in order, and on any mismatch prints the expected and obtained
//! results side by side in the same notation.

pub mod anvil_executor;
pub mod byte_formatter;
pub mod call_renderer;
pub mod contract_compiler;
pub mod error;
pub mod execution;
pub mod expectation_parser;
pub mod formatting;
pub mod test_case_store;
pub mod types;

pub use byte_formatter::format_bytes;
pub use call_renderer::render_call;
pub use error::{FormatError, ParseError, SemanticTestError};
pub use execution::{AnvilEnvironment, ExecutionEnvironment};
pub use semantic_test::SemanticTest;
pub use test_case_store::{FunctionCallTest, TestCaseStore};
