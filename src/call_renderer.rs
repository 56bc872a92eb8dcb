//! Renders a declared call back into the expectation DSL.

use crate::byte_formatter::format_bytes;
use crate::error::FormatError;
use crate::formatting::{self, Highlighter, Style};
use crate::test_case_store::FunctionCallTest;
use crate::types::{encoded_width, AbiKind, DisplayMode, Parameter, ParameterList, WORD_SIZE};

/// Render one call test as a DSL block terminated by a newline.
///
/// With `render_result` the declared expectation is shown, otherwise the
/// bytes the call actually produced. When `highlight` is set and the test did
/// not match its expectation, the result segment is painted as a mismatch.
pub fn render_call(
    test: &FunctionCallTest<'_>,
    line_prefix: &str,
    render_result: bool,
    highlight: bool,
    highlighter: &dyn Highlighter,
) -> Result<String, FormatError> {
    let call = test.call;
    let do_highlight = highlight && !test.matches_expectation();
    let single_line = call.display_mode == DisplayMode::SingleLine;

    let mut stream = format!("{}{} {}", line_prefix, formatting::NEWLINE, call.signature);
    if !call.value.is_zero() {
        stream.push_str(&format!("{} {} {}", formatting::COMMA, call.value, formatting::ETHER));
    }
    if !call.arguments.raw_bytes.is_empty() {
        let arguments = format_bytes(&call.arguments.raw_bytes, &call.arguments.parameters)?;
        stream.push_str(&format!("{} {}", formatting::COLON, arguments));
    }

    if single_line {
        stream.push_str(&format!(" {} ", formatting::ARROW));
    } else {
        stream.push_str(&format!(
            "\n{prefix}{nl} {arrow}\n{prefix}{nl} ",
            prefix = line_prefix,
            nl = formatting::NEWLINE,
            arrow = formatting::ARROW,
        ));
    }

    let result = render_result_segment(test, render_result)?;
    if do_highlight {
        stream.push_str(&highlighter.paint(&result, Style::Mismatch));
    } else {
        stream.push_str(&result);
    }
    stream.push('\n');

    Ok(stream)
}

fn render_result_segment(test: &FunctionCallTest<'_>, render_result: bool) -> Result<String, FormatError> {
    let expectations = &test.call.expectations;
    let (bytes, failure) = if render_result {
        (expectations.raw_bytes.as_slice(), expectations.failure)
    } else {
        (test.raw_bytes(), test.failure().unwrap_or(false))
    };

    if failure {
        return Ok(formatting::FAILURE.to_string());
    }
    format_bytes(bytes, &output_layout(bytes, &expectations.result))
}

/// Parameters to lay over `bytes`: the declared ones when they cover the
/// buffer exactly, otherwise untyped 32-byte words.
pub fn output_layout(bytes: &[u8], declared: &[Parameter]) -> ParameterList {
    if encoded_width(declared) == bytes.len() {
        return declared.to_vec();
    }
    bytes
        .chunks(WORD_SIZE)
        .map(|chunk| {
            let kind = if chunk.len() == WORD_SIZE {
                AbiKind::Invalid
            } else {
                AbiKind::Untyped
            };
            Parameter::new(kind, chunk.len())
        })
        .collect()
}
