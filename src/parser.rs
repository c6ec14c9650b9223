//! Include directive parser

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{PreprocessorError, Result};

lazy_static! {
    static ref INCLUDE_RE: Regex = Regex::new(r"^\s*#include\s+").unwrap();
}

/// Quote types for include directives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeQuoteType {
    /// <filepath>
    AngleBrackets,
    /// "filepath"
    DoubleQuotes,
}

impl IncludeQuoteType {
    fn closing_delimiter(self) -> char {
        match self {
            IncludeQuoteType::AngleBrackets => '>',
            IncludeQuoteType::DoubleQuotes => '"',
        }
    }
}

/// Ways an include directive can be malformed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveErrorKind {
    /// Target does not open with `"` or `<`
    MissingDelimiter,
    /// `"` never closed on the same line
    UnterminatedQuote,
    /// `<` never closed on the same line
    UnterminatedAngle,
    /// Nothing between the delimiters
    EmptyPath,
    /// Something other than a line comment after the closing delimiter
    TrailingTokens,
}

impl DirectiveErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            DirectiveErrorKind::MissingDelimiter => "expected '<' or '\"'",
            DirectiveErrorKind::UnterminatedQuote => "expected '\"', got EOL",
            DirectiveErrorKind::UnterminatedAngle => "expected '>', got EOL",
            DirectiveErrorKind::EmptyPath => "empty file name in #include",
            DirectiveErrorKind::TrailingTokens => "extra tokens at end of #include directive",
        }
    }
}

/// Parsed include directive
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDirective {
    /// Line number (1-indexed)
    pub line_number: usize,
    /// Column of the opening delimiter (1-indexed)
    pub column: usize,
    /// Path to include, relative to the shader root
    pub file_path: String,
    /// Quote type used
    pub quote_type: IncludeQuoteType,
}

/// Include directive parser
pub struct IncludeParser;

impl IncludeParser {
    /// Parse a single line of shader source.
    ///
    /// Returns `Ok(None)` for anything that is not an include directive.
    /// `file` names the source in the error raised for a malformed directive.
    pub fn parse_line(line: &str, line_number: usize, file: &str) -> Result<Option<IncludeDirective>> {
        let line = line.trim_end();

        let prefix = match INCLUDE_RE.find(line) {
            Some(prefix) => prefix,
            None => return Ok(None),
        };

        let target = &line[prefix.end()..];
        let column = line[..prefix.end()].chars().count() + 1;

        Self::parse_target(target, line_number, column)
            .map(Some)
            .map_err(|(kind, offset, found)| {
                PreprocessorError::InvalidIncludeDirective {
                    file: file.to_string(),
                    line_number,
                    column: column + offset,
                    kind,
                    found,
                }
                .into()
            })
    }

    /// Split `target` into path and quote type.
    ///
    /// On failure returns the error kind, the char offset of the failure
    /// within `target`, and the offending text.
    fn parse_target(
        target: &str,
        line_number: usize,
        column: usize,
    ) -> std::result::Result<IncludeDirective, (DirectiveErrorKind, usize, String)> {
        let mut chars = target.chars();

        let quote_type = match chars.next() {
            Some('"') => IncludeQuoteType::DoubleQuotes,
            Some('<') => IncludeQuoteType::AngleBrackets,
            Some(c) => return Err((DirectiveErrorKind::MissingDelimiter, 0, c.to_string())),
            None => return Err((DirectiveErrorKind::MissingDelimiter, 0, String::new())),
        };

        let inner = chars.as_str();
        let end = target.chars().count();

        let close = match inner.find(quote_type.closing_delimiter()) {
            Some(close) => close,
            None => {
                let kind = match quote_type {
                    IncludeQuoteType::DoubleQuotes => DirectiveErrorKind::UnterminatedQuote,
                    IncludeQuoteType::AngleBrackets => DirectiveErrorKind::UnterminatedAngle,
                };
                return Err((kind, end, String::new()));
            }
        };

        let file_path = &inner[..close];
        if file_path.trim().is_empty() {
            return Err((DirectiveErrorKind::EmptyPath, 1, String::new()));
        }

        let rest = &inner[close + 1..];
        let trailing = rest.trim_start();
        if !trailing.is_empty() && !trailing.starts_with("//") {
            let offset = end - trailing.chars().count();
            return Err((DirectiveErrorKind::TrailingTokens, offset, trailing.to_string()));
        }

        Ok(IncludeDirective {
            line_number,
            column,
            file_path: file_path.to_string(),
            quote_type,
        })
    }
}
