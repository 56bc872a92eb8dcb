//! DSL tokens and terminal emphasis used when rendering calls and reports.

use colored::Colorize;

pub const NEWLINE: &str = "//";
pub const ARROW: &str = "->";
pub const COLON: &str = ":";
pub const COMMA: &str = ",";
pub const ETHER: &str = "ether";
pub const FAILURE: &str = "FAILURE";
pub const DELIMITER: &str = "// ----";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Section headings of the failure report.
    Heading,
    /// The closing advisory of the failure report.
    Attention,
    /// A result segment that differs from its expectation.
    Mismatch,
}

/// Wraps a span of text in visual emphasis.
pub trait Highlighter {
    fn paint(&self, text: &str, style: Style) -> String;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl Highlighter for Plain {
    fn paint(&self, text: &str, _style: Style) -> String {
        text.to_string()
    }
}

/// ANSI colours through `colored`, which also honours NO_COLOR and tty detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ansi;

impl Highlighter for Ansi {
    fn paint(&self, text: &str, style: Style) -> String {
        match style {
            Style::Heading => text.bold().cyan().to_string(),
            Style::Attention => text.bold().red().to_string(),
            Style::Mismatch => text.on_red().to_string(),
        }
    }
}

pub fn highlighter(use_color: bool) -> &'static dyn Highlighter {
    if use_color {
        &Ansi
    } else {
        &Plain
    }
}
