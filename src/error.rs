//! Preprocessor error types

use std::path::PathBuf;

use crate::diagnostics::SourceDiagnostic;
use crate::parser::DirectiveErrorKind;

/// Preprocessor error types
#[derive(Debug, thiserror::Error)]
pub enum PreprocessorError {
    /// Top-level source file not found
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Included file not found
    #[error("Include file not found: {path} (included from {from}:{line_number})")]
    IncludeNotFound {
        path: String,
        from: String,
        line_number: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed include directive
    #[error("Invalid include directive at {file}:{line_number}:{column}: {}", .kind.message())]
    InvalidIncludeDirective {
        file: String,
        line_number: usize,
        column: usize,
        kind: DirectiveErrorKind,
        found: String,
    },

    /// File included while it is still being expanded
    #[error("Recursive inclusion of {path} at {from}:{line_number} (include stack: {stack})")]
    RecursiveInclude {
        path: String,
        from: String,
        line_number: usize,
        stack: String,
    },

    /// Max include depth exceeded
    #[error("Maximum include depth ({max_depth}) exceeded at {from}:{line_number} including {path}")]
    MaxDepthExceeded {
        path: String,
        from: String,
        line_number: usize,
        max_depth: usize,
    },

    /// Validator process could not be started
    #[error("Failed to launch validator `{program}`")]
    ValidatorLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl PreprocessorError {
    /// Diagnostics reported for a failure attributable to a directive line.
    ///
    /// Every such failure yields the primary diagnostic followed by a
    /// "compilation terminated" diagnostic on the next line. Returns `None`
    /// for failures with no source position.
    pub fn diagnostics(&self) -> Option<Vec<SourceDiagnostic>> {
        let (file, line_number, token, message) = match self {
            PreprocessorError::InvalidIncludeDirective {
                file,
                line_number,
                kind,
                found,
                ..
            } => (file, *line_number, found.clone(), kind.message().to_string()),
            PreprocessorError::IncludeNotFound {
                path,
                from,
                line_number,
            } => (from, *line_number, path.clone(), "could not open include file".to_string()),
            PreprocessorError::RecursiveInclude {
                path,
                from,
                line_number,
                ..
            } => (from, *line_number, path.clone(), "recursive inclusion".to_string()),
            PreprocessorError::MaxDepthExceeded {
                path,
                from,
                line_number,
                max_depth,
            } => (
                from,
                *line_number,
                path.clone(),
                format!("maximum include depth ({}) exceeded", max_depth),
            ),
            _ => return None,
        };

        Some(vec![
            SourceDiagnostic::new(file.clone(), line_number, token, message),
            SourceDiagnostic::new(file.clone(), line_number + 1, "", "compilation terminated"),
        ])
    }
}

/// Result type for preprocessor operations
pub type Result<T> = anyhow::Result<T>;
