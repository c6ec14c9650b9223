//! Processing every source under the shader root

use std::fs;
use std::io::Write;

use anyhow::Context;
use log::{info, warn};

use crate::diagnostics::{DiagnosticTranslator, SourceDiagnostic, ERROR_PREFIX};
use crate::error::{PreprocessorError, Result};
use crate::preprocessor::ShaderPreprocessor;
use crate::resolver::FileResolver;
use crate::validator::Validator;

/// What happened to one source
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    /// Expanded and validated without errors
    Clean,
    /// An include directive could not be expanded
    ExpansionFailed { diagnostics: Vec<SourceDiagnostic> },
    /// The validator reported errors
    ValidationFailed { errors: usize },
    /// Processing stopped on an error with no source position
    Fault { message: String },
}

/// Outcome of one source
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub source: String,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Clean
    }
}

/// Outcomes of a whole run, in processing order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(FileOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}

/// Expands and validates sources one at a time
pub struct BatchRunner<V> {
    preprocessor: ShaderPreprocessor,
    validator: V,
}

impl<V: Validator> BatchRunner<V> {
    pub fn new(preprocessor: ShaderPreprocessor, validator: V) -> Self {
        Self {
            preprocessor,
            validator,
        }
    }

    /// Process every source under the shader root, writing diagnostics to `out`.
    ///
    /// Fails only if the sources cannot be listed, the build directory
    /// cannot be created, or `out` cannot be written.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<BatchReport> {
        let config = self.preprocessor.config();
        let sources = FileResolver::discover_sources(config)?;

        fs::create_dir_all(&config.build_directory).with_context(|| {
            format!("Failed to create build directory: {}", config.build_directory.display())
        })?;

        // Flattened output would overwrite the sources it is read from
        let build_directory = config.build_directory.canonicalize()?;
        if build_directory == config.shader_root.canonicalize()? {
            anyhow::bail!(
                "Build directory must differ from the shader root: {}",
                config.build_directory.display()
            );
        }

        let mut report = BatchReport::default();
        for source in sources {
            let outcome = self.process_source(&source, out)?;
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    /// Expand one source, then validate it if expansion succeeded
    pub fn process_source(&mut self, source: &str, out: &mut dyn Write) -> Result<FileOutcome> {
        info!("Processing {}", source);
        let output_path = self.preprocessor.config().output_path(source);

        let registry = match self.preprocessor.process_file(source, &output_path) {
            Ok(registry) => registry,
            Err(err) => {
                let status = report_expansion_error(source, &err, out)?;
                return Ok(FileOutcome {
                    source: source.to_string(),
                    status,
                });
            }
        };

        let translator = DiagnosticTranslator::new(&registry);
        let mut errors = 0;
        let validated = self.validator.validate(&output_path, &mut |line| {
            let translated = translator.translate(line);
            if !translated.is_empty() {
                errors += 1;
            }
            for line in translated {
                writeln!(out, "{}", line)?;
            }
            Ok(())
        });

        let status = match validated {
            Err(err) => {
                warn!("Validation of {} failed: {:#}", source, err);
                writeln!(out, "{}{}: {:#}", ERROR_PREFIX, source, err)?;
                FileStatus::Fault {
                    message: format!("{:#}", err),
                }
            }
            Ok(()) if errors > 0 => FileStatus::ValidationFailed { errors },
            Ok(()) => FileStatus::Clean,
        };

        Ok(FileOutcome {
            source: source.to_string(),
            status,
        })
    }
}

fn report_expansion_error(
    source: &str,
    err: &anyhow::Error,
    out: &mut dyn Write,
) -> Result<FileStatus> {
    let diagnostics = err
        .downcast_ref::<PreprocessorError>()
        .and_then(PreprocessorError::diagnostics);

    match diagnostics {
        Some(diagnostics) => {
            for diagnostic in &diagnostics {
                writeln!(out, "{}{}", ERROR_PREFIX, diagnostic)?;
            }
            writeln!(
                out,
                "{}{} compilation errors.  No code generated.",
                ERROR_PREFIX,
                diagnostics.len()
            )?;
            Ok(FileStatus::ExpansionFailed { diagnostics })
        }
        None => {
            warn!("Expansion of {} failed: {:#}", source, err);
            writeln!(out, "{}{}: {:#}", ERROR_PREFIX, source, err)?;
            Ok(FileStatus::Fault {
                message: format!("{:#}", err),
            })
        }
    }
}
