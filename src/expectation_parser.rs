//! Parser for the expectation section of a semantic test file.
//!
//! Every line starts with `//`. A call reads
//! `signature[, <value> ether][: <args>] -> <result>`, either on one line or
//! split so that the arrow and the result follow on their own lines.

use crate::error::ParseError;
use crate::formatting;
use crate::types::{AbiKind, Arguments, DisplayMode, Expectations, FunctionCall, Parameter, WORD_SIZE};
use ethers::types::U256;
use tracing::debug;

/// Parse the expectation section. `first_line` is the 1-based line number of
/// the section's first line within the whole file, used in error messages.
pub fn parse_function_calls(section: &str, first_line: usize) -> Result<Vec<FunctionCall>, ParseError> {
    let mut lines = Vec::new();
    for (i, raw) in section.lines().enumerate() {
        let line_no = first_line + i;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let content = trimmed
            .strip_prefix(formatting::NEWLINE)
            .ok_or_else(|| ParseError::new(line_no, format!("expected '{}', found '{}'", formatting::NEWLINE, trimmed)))?;
        lines.push((line_no, content.trim()));
    }

    let mut parser = TestFileParser { lines, pos: 0 };
    let calls = parser.parse_calls()?;
    debug!("Parsed {} function call(s)", calls.len());
    Ok(calls)
}

struct TestFileParser<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> TestFileParser<'a> {
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = self.lines.get(self.pos).copied();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn peek_line(&self) -> Option<(usize, &'a str)> {
        self.lines.get(self.pos).copied()
    }

    fn parse_calls(&mut self) -> Result<Vec<FunctionCall>, ParseError> {
        let mut calls = Vec::new();
        while let Some((line_no, content)) = self.next_line() {
            if content.is_empty() {
                continue;
            }
            calls.push(self.parse_call(line_no, content)?);
        }
        Ok(calls)
    }

    fn parse_call(&mut self, line_no: usize, content: &'a str) -> Result<FunctionCall, ParseError> {
        let mut cursor = Cursor::new(content, line_no);
        let signature = cursor.signature()?;

        let mut value = U256::zero();
        if cursor.eat(formatting::COMMA) {
            value = cursor.unsigned_decimal()?;
            if !cursor.eat(formatting::ETHER) {
                return Err(cursor.error(format!("expected '{}'", formatting::ETHER)));
            }
        }

        let mut arguments = Arguments::default();
        if cursor.eat(formatting::COLON) {
            let (raw_bytes, parameters) = cursor.values()?;
            arguments = Arguments { raw_bytes, parameters };
        }

        let (expectations, display_mode) = if cursor.eat(formatting::ARROW) {
            (cursor.result()?, DisplayMode::SingleLine)
        } else if cursor.at_end() {
            (self.parse_multi_line_result(line_no)?, DisplayMode::MultiLine)
        } else {
            return Err(cursor.error(format!("expected '{}'", formatting::ARROW)));
        };

        Ok(FunctionCall {
            signature,
            value,
            arguments,
            expectations,
            display_mode,
        })
    }

    fn parse_multi_line_result(&mut self, call_line: usize) -> Result<Expectations, ParseError> {
        let (line_no, content) = self
            .next_line()
            .ok_or_else(|| ParseError::new(call_line, format!("expected '{}' on the next line", formatting::ARROW)))?;

        let mut cursor = Cursor::new(content, line_no);
        if !cursor.eat(formatting::ARROW) {
            return Err(cursor.error(format!("expected '{}'", formatting::ARROW)));
        }
        if !cursor.at_end() {
            return cursor.result();
        }

        // The result, possibly empty, sits on the line after the arrow.
        if let Some((next_no, next)) = self.peek_line() {
            if let Ok(expectations) = Cursor::new(next, next_no).result() {
                self.pos += 1;
                return Ok(expectations);
            }
        }
        Ok(Expectations::default())
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self { text, pos: 0, line }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let message = message.into();
        let rest = self.rest();
        if rest.is_empty() {
            ParseError::new(self.line, format!("{} at end of line", message))
        } else {
            ParseError::new(self.line, format!("{}, found '{}'", message, rest))
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn rest(&self) -> &'a str {
        self.text[self.pos..].trim()
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.text.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.text[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// A run of characters that may form a name or a literal. A `-` is only
    /// taken as a leading sign, so `->` always ends the word.
    fn word(&mut self) -> &'a str {
        self.skip_whitespace();
        let rest = &self.text[self.pos..];
        let len = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_alphanumeric() || c == '_' || c == '$' || (c == '-' && i == 0)))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += len;
        &rest[..len]
    }

    fn signature(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let name = self.word();
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            return Err(self.error("expected a function name"));
        }
        if !self.text[self.pos..].starts_with('(') {
            return Err(self.error("expected '(' after the function name"));
        }

        let mut depth = 0usize;
        for (offset, c) in self.text[self.pos..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += offset + 1;
                        return Ok(self.text[start..self.pos].to_string());
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::new(self.line, "unbalanced parentheses in signature"))
    }

    fn unsigned_decimal(&mut self) -> Result<U256, ParseError> {
        let literal = self.word();
        if literal.is_empty() || !literal.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::new(self.line, format!("expected a decimal number, found '{}'", literal)));
        }
        U256::from_dec_str(literal)
            .map_err(|_| ParseError::new(self.line, format!("'{}' does not fit in 256 bits", literal)))
    }

    /// Comma-separated values up to the arrow or the end of the line.
    fn values(&mut self) -> Result<(Vec<u8>, Vec<Parameter>), ParseError> {
        let mut raw_bytes = Vec::new();
        let mut parameters = Vec::new();
        loop {
            let literal = self.word();
            if literal.is_empty() {
                if parameters.is_empty() {
                    break;
                }
                return Err(self.error("expected a value after ','"));
            }
            let (word, kind) = encode_literal(literal).map_err(|message| ParseError::new(self.line, message))?;
            raw_bytes.extend_from_slice(&word);
            parameters.push(Parameter::new(kind, WORD_SIZE));
            if !self.eat(formatting::COMMA) {
                break;
            }
        }
        Ok((raw_bytes, parameters))
    }

    /// `FAILURE` or a possibly empty value list, which must end the line.
    fn result(&mut self) -> Result<Expectations, ParseError> {
        let expectations = if self.eat(formatting::FAILURE) {
            Expectations {
                failure: true,
                ..Expectations::default()
            }
        } else {
            let (raw_bytes, result) = self.values()?;
            Expectations {
                raw_bytes,
                result,
                failure: false,
            }
        };
        if !self.at_end() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expectations)
    }
}

fn encode_literal(literal: &str) -> Result<([u8; WORD_SIZE], AbiKind), String> {
    let mut word = [0u8; WORD_SIZE];
    match literal {
        "true" => {
            word[WORD_SIZE - 1] = 1;
            return Ok((word, AbiKind::UnsignedInteger));
        }
        "false" => return Ok((word, AbiKind::UnsignedInteger)),
        _ => {}
    }

    if let Some(digits) = literal.strip_prefix("0x") {
        if digits.is_empty() || digits.len() > 2 * WORD_SIZE {
            return Err(format!("invalid hex literal '{}'", literal));
        }
        let value = U256::from_str_radix(digits, 16).map_err(|_| format!("invalid hex literal '{}'", literal))?;
        value.to_big_endian(&mut word);
        return Ok((word, AbiKind::UnsignedInteger));
    }

    let (negative, digits) = match literal.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, literal),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid number '{}'", literal));
    }
    let magnitude = U256::from_dec_str(digits).map_err(|_| format!("'{}' does not fit in 256 bits", literal))?;

    if negative {
        let min = U256::one() << 255;
        if magnitude > min {
            return Err(format!("'{}' does not fit in int256", literal));
        }
        let (twos_complement, _) = (!magnitude).overflowing_add(U256::one());
        twos_complement.to_big_endian(&mut word);
        Ok((word, AbiKind::SignedInteger))
    } else {
        magnitude.to_big_endian(&mut word);
        Ok((word, AbiKind::UnsignedInteger))
    }
}
