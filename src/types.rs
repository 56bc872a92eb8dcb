// type definitions
use ethers::types::U256;

/// Width of one ABI-encoded word.
pub const WORD_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiKind {
    SignedInteger,
    UnsignedInteger,
    /// The type could not be determined, e.g. the expectation was empty.
    Invalid,
    /// Rest of the buffer carries no structure.
    Untyped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiType {
    pub kind: AbiKind,
    pub size: usize,
}

impl AbiType {
    pub fn new(kind: AbiKind, size: usize) -> Self {
        Self { kind, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    pub abi_type: AbiType,
}

impl Parameter {
    pub fn new(kind: AbiKind, size: usize) -> Self {
        Self { abi_type: AbiType::new(kind, size) }
    }
}

/// Insertion order is byte order in the buffer the list describes.
pub type ParameterList = Vec<Parameter>;

/// Total number of bytes a parameter list claims.
pub fn encoded_width(params: &[Parameter]) -> usize {
    params.iter().map(|p| p.abi_type.size).sum()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    pub raw_bytes: Vec<u8>,
    pub parameters: ParameterList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    pub raw_bytes: Vec<u8>,
    pub result: ParameterList,
    /// The call is expected to revert.
    pub failure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    SingleLine,
    MultiLine,
}

/// One declared invocation, as written in the expectation section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub signature: String,
    pub value: U256,
    pub arguments: Arguments,
    pub expectations: Expectations,
    pub display_mode: DisplayMode,
}

/// What one execution of a declared call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub raw_bytes: Vec<u8>,
    pub failure: bool,
}

/// Raw result of a deployment or call against an execution environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub output: Vec<u8>,
    pub success: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_passed: usize,
    pub total_failed: usize,
    pub total_errored: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_width_sums_parameter_sizes() {
        let params = vec![
            Parameter::new(AbiKind::UnsignedInteger, WORD_SIZE),
            Parameter::new(AbiKind::SignedInteger, 1),
            Parameter::new(AbiKind::Untyped, 0),
        ];
        assert_eq!(encoded_width(&params), 33);
        assert_eq!(encoded_width(&[]), 0);
    }
}
