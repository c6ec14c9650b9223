//! Diagnostics produced by expansion and translation of validator output
//!
//! The validator only sees the flattened file, so it reports positions as
//! `<file index>:<line>` pairs taken from the `#line` markers. Translation
//! maps the index back through the [`FileRegistry`] of the same expansion
//! and lists the files that led to the inclusion.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::registry::FileRegistry;

/// Prefix of error lines, both ours and the validator's
pub const ERROR_PREFIX: &str = "ERROR: ";

const INCLUDED_FROM_INDENT: &str = "       ";

lazy_static! {
    static ref DIAGNOSTIC_RE: Regex =
        Regex::new(r"^(?P<severity>ERROR|WARNING): (?:(?P<index>\d+):(?P<line>\d+))?(?P<rest>.*)$")
            .unwrap();
}

/// Diagnostic raised by the preprocessor itself
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDiagnostic {
    pub file: String,
    pub line_number: usize,
    pub token: String,
    pub message: String,
}

impl SourceDiagnostic {
    pub fn new(
        file: impl Into<String>,
        line_number: usize,
        token: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line_number,
            token: token.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: '{}' : {}",
            self.file, self.line_number, self.token, self.message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Position as encoded by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedPosition {
    pub file_index: usize,
    pub line_number: usize,
}

/// One parsed line of validator output
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticLine<'a> {
    pub severity: Severity,
    pub position: Option<EncodedPosition>,
    /// Everything after the position (or after the severity if there is none)
    pub message: &'a str,
    /// Original text following the file index, line number included
    pub after_index: &'a str,
}

impl<'a> DiagnosticLine<'a> {
    /// Parse a validator line. Returns `None` for lines without a severity.
    pub fn parse(line: &'a str) -> Option<Self> {
        let captures = DIAGNOSTIC_RE.captures(line)?;

        let severity = match &captures["severity"] {
            "ERROR" => Severity::Error,
            _ => Severity::Warning,
        };

        let position = match (captures.name("index"), captures.name("line")) {
            (Some(index), Some(line)) => match (index.as_str().parse(), line.as_str().parse()) {
                (Ok(file_index), Ok(line_number)) => Some(EncodedPosition {
                    file_index,
                    line_number,
                }),
                _ => None,
            },
            _ => None,
        };

        let (message, after_index) = match (position, captures.name("index")) {
            (Some(_), Some(index)) => (
                captures.name("rest").map_or("", |m| m.as_str()),
                &line[index.end()..],
            ),
            _ => (&line[captures["severity"].len() + 2..], ""),
        };

        Some(DiagnosticLine {
            severity,
            position,
            message,
            after_index,
        })
    }
}

/// Rewrites validator output into source coordinates
pub struct DiagnosticTranslator<'r> {
    registry: &'r FileRegistry,
}

impl<'r> DiagnosticTranslator<'r> {
    pub fn new(registry: &'r FileRegistry) -> Self {
        Self { registry }
    }

    /// Translate one line of validator output.
    ///
    /// Only error lines produce output; an empty result means the line was
    /// suppressed. Errors whose position cannot be resolved are returned
    /// unchanged.
    pub fn translate(&self, line: &str) -> Vec<String> {
        let line = line.trim();

        let diagnostic = match DiagnosticLine::parse(line) {
            Some(diagnostic) if diagnostic.severity == Severity::Error => diagnostic,
            _ => return Vec::new(),
        };

        let position = match diagnostic.position {
            Some(position) => position,
            None => return vec![line.to_string()],
        };

        let file = match self.registry.get(position.file_index) {
            Some(file) => file,
            None => return vec![line.to_string()],
        };

        let mut lines = vec![format!(
            "{}{}{}",
            ERROR_PREFIX, file.display_name, diagnostic.after_index
        )];

        lines.extend(
            self.registry
                .include_chain(position.file_index)
                .map(|includer| format!("{}(included from {})", INCLUDED_FROM_INDENT, includer.display_name)),
        );

        lines
    }
}
