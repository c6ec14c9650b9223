//! External shader validation

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context;
use log::debug;

use crate::error::{PreprocessorError, Result};

/// Checks a flattened shader and reports its output line by line
pub trait Validator {
    /// Validate `flattened`, passing each output line to `sink` as it arrives
    fn validate(&mut self, flattened: &Path, sink: &mut dyn FnMut(&str) -> Result<()>) -> Result<()>;
}

/// Runs `glslang` (or a compatible program) as a subprocess
#[derive(Debug, Clone)]
pub struct GlslangValidator {
    program: String,
}

impl GlslangValidator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for GlslangValidator {
    fn default() -> Self {
        Self::new("glslang")
    }
}

impl Validator for GlslangValidator {
    fn validate(&mut self, flattened: &Path, sink: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
        debug!("Running {} {}", self.program, flattened.display());

        let mut child = Command::new(&self.program)
            .arg(flattened)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| PreprocessorError::ValidatorLaunch {
                program: self.program.clone(),
                source,
            })?;

        let drained = match child.stdout.take() {
            Some(stdout) => drain_lines(BufReader::new(stdout), sink),
            None => Ok(()),
        };

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for {}", self.program))?;
        debug!("{} exited with {}", self.program, status);

        drained
    }
}

/// Pass every line of `reader` to `sink`, reading to EOF even after `sink` fails.
///
/// Invalid UTF-8 is replaced rather than treated as an error. The first
/// `sink` error is returned once the stream is exhausted.
fn drain_lines(mut reader: impl BufRead, sink: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
    let mut buf = Vec::new();
    let mut first_error = None;

    loop {
        buf.clear();
        if reader
            .read_until(b'\n', &mut buf)
            .context("Failed to read validator output")?
            == 0
        {
            break;
        }

        if first_error.is_none() {
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if let Err(e) = sink(line) {
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
