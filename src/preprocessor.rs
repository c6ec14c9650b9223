//! Main preprocessor functionality

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::debug;

use crate::error::{PreprocessorError, Result};
use crate::parser::IncludeParser;
use crate::registry::FileRegistry;
use crate::resolver::{FileResolver, IncludeOrigin, ProcessingConfig, ProcessingContext};

/// GLSL include preprocessor
pub struct ShaderPreprocessor {
    config: ProcessingConfig,
}

impl ShaderPreprocessor {
    /// Create preprocessor with config
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    /// Get config
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Expand a root-relative source into `output_path`.
    ///
    /// Returns the registry describing which file each `#line` index refers
    /// to. On error, whatever was expanded before the failure stays in the
    /// output file.
    pub fn process_file(&self, source: &str, output_path: &Path) -> Result<FileRegistry> {
        let mut context = ProcessingContext::new(self.config.clone())?;

        let file = File::create(output_path)
            .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;
        let mut sink = BufWriter::new(file);

        let result = self.expand(source, &mut sink, &mut context);
        sink.flush()
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        result?;

        Ok(context.into_registry())
    }

    /// Expand a root-relative source into `sink`, registering every file
    /// touched in the context's registry.
    pub fn expand(
        &self,
        path: &str,
        sink: &mut dyn Write,
        context: &mut ProcessingContext,
    ) -> Result<()> {
        self.expand_file(path, None, sink, context)
    }

    fn expand_file(
        &self,
        path: &str,
        origin: Option<IncludeOrigin>,
        sink: &mut dyn Write,
        context: &mut ProcessingContext,
    ) -> Result<()> {
        let resolved = self.resolve(path, origin.as_ref(), context.root())?;
        let display_name = FileResolver::display_name(&resolved, context.root());

        context.enter_file(&resolved, origin.as_ref())?;

        let file_index = context.registry_mut().register(
            &resolved,
            display_name.clone(),
            origin.as_ref().map(|o| o.index),
        );
        debug!("{} has file index {}", display_name, file_index);

        if file_index != 0 {
            write_line_marker(sink, 1, file_index)?;
        }

        let file = File::open(&resolved)
            .with_context(|| format!("Failed to read file: {}", resolved.display()))?;

        for (line_index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read file: {}", resolved.display()))?;
            let line_number = line_index + 1;
            let line = line.trim_end();

            match IncludeParser::parse_line(line, line_number, &display_name)? {
                Some(directive) => {
                    debug!(
                        "{}:{}:{}: including {}",
                        display_name, directive.line_number, directive.column, directive.file_path
                    );
                    let origin = IncludeOrigin {
                        index: file_index,
                        display_name: display_name.clone(),
                        line_number: directive.line_number,
                    };
                    self.expand_file(&directive.file_path, Some(origin), sink, context)?;

                    // Resume numbering on the line after the directive
                    write_line_marker(sink, directive.line_number + 1, file_index)?;
                }
                None => writeln!(sink, "{}", line)?,
            }
        }

        context.exit_file();
        Ok(())
    }

    fn resolve(&self, path: &str, origin: Option<&IncludeOrigin>, root: &Path) -> Result<PathBuf> {
        FileResolver::resolve_path(path, root).map_err(|e| match origin {
            Some(origin) if is_not_found(&e) => PreprocessorError::IncludeNotFound {
                path: path.to_string(),
                from: origin.display_name.clone(),
                line_number: origin.line_number,
            }
            .into(),
            _ => e,
        })
    }
}

fn is_not_found(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<PreprocessorError>(),
        Some(PreprocessorError::FileNotFound { .. })
    )
}

/// Write a `#line` marker attributing the next line to `file_index`
fn write_line_marker(sink: &mut dyn Write, line_number: usize, file_index: usize) -> Result<()> {
    writeln!(sink, "#line {} {}", line_number, file_index)?;
    Ok(())
}

/// Builder for preprocessor config
pub struct PreprocessorBuilder {
    config: ProcessingConfig,
}

impl PreprocessorBuilder {
    /// Create builder with defaults
    pub fn new() -> Self {
        Self {
            config: ProcessingConfig::default(),
        }
    }

    /// Set shader root; the build directory follows unless set explicitly
    pub fn shader_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        let path = path.into();
        if self.config.build_directory == self.config.shader_root.join("build") {
            self.config.build_directory = path.join("build");
        }
        self.config.shader_root = path;
        self
    }

    /// Set build directory
    pub fn build_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.build_directory = path.into();
        self
    }

    /// Set max include depth
    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.config.max_include_depth = depth;
        self
    }

    /// Build preprocessor
    pub fn build(self) -> ShaderPreprocessor {
        ShaderPreprocessor::new(self.config)
    }
}

impl Default for PreprocessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DirectiveErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn expand(dir: &TempDir, source: &str) -> (String, Result<FileRegistry>) {
        let preprocessor = PreprocessorBuilder::new().shader_root(dir.path()).build();
        let output_path = dir.path().join("out.glsl");
        let result = preprocessor.process_file(source, &output_path);
        (fs::read_to_string(&output_path).unwrap(), result)
    }

    fn names(registry: &FileRegistry) -> Vec<&str> {
        registry.iter().map(|f| f.display_name.as_str()).collect()
    }

    #[test]
    fn test_no_includes_is_identity() {
        let temp_dir = TempDir::new().unwrap();
        let source = "#version 330 core\n\nout vec4 color;\nvoid main() {\n    color = vec4(1.0);\n}\n";
        write(&temp_dir, "plain.frag.glsl", source);

        let (output, result) = expand(&temp_dir, "plain.frag.glsl");
        let registry = result.unwrap();
        assert_eq!(output, source);
        assert_eq!(names(&registry), vec!["plain.frag.glsl"]);
    }

    #[test]
    fn test_trailing_whitespace_trimmed() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "a.frag.glsl", "  int x;   \r\nint y;\t\n");

        let (output, result) = expand(&temp_dir, "a.frag.glsl");
        result.unwrap();
        assert_eq!(output, "  int x;\nint y;\n");
    }

    #[test]
    fn test_include_chain_markers() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "a.frag.glsl", "#version 330\n#include \"b.glsl\"\nvoid main() {}\n");
        write(&temp_dir, "b.glsl", "float b;\n#include <c.glsl>\n");
        write(&temp_dir, "c.glsl", "float c;\n");

        let (output, result) = expand(&temp_dir, "a.frag.glsl");
        let registry = result.unwrap();

        assert_eq!(names(&registry), vec!["a.frag.glsl", "b.glsl", "c.glsl"]);
        assert_eq!(registry.get(2).unwrap().included_from, Some(1));
        assert_eq!(
            output,
            "#version 330\n\
             #line 1 1\n\
             float b;\n\
             #line 1 2\n\
             float c;\n\
             #line 3 1\n\
             #line 3 0\n\
             void main() {}\n"
        );
    }

    #[test]
    fn test_repeated_include_reuses_index() {
        let temp_dir = TempDir::new().unwrap();
        write(
            &temp_dir,
            "a.vert.glsl",
            "#include \"common.glsl\"\n#include \"other.glsl\"\n#include \"common.glsl\"\n",
        );
        write(&temp_dir, "common.glsl", "float common;\n");
        write(&temp_dir, "other.glsl", "#include \"common.glsl\"\n");

        let (output, result) = expand(&temp_dir, "a.vert.glsl");
        let registry = result.unwrap();

        assert_eq!(names(&registry), vec!["a.vert.glsl", "common.glsl", "other.glsl"]);
        assert_eq!(output.matches("#line 1 1\n").count(), 3);
        assert_eq!(output.matches("float common;\n").count(), 3);
    }

    #[test]
    fn test_missing_delimiter_aborts() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "a.frag.glsl", "int before;\n#include foo.glsl\nint after;\n");

        let (output, result) = expand(&temp_dir, "a.frag.glsl");
        let err = result.unwrap_err();
        let error = err.downcast_ref::<PreprocessorError>().unwrap();

        assert!(matches!(
            error,
            PreprocessorError::InvalidIncludeDirective {
                kind: DirectiveErrorKind::MissingDelimiter,
                line_number: 2,
                ..
            }
        ));

        let diagnostics = error.diagnostics().unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].to_string(), "a.frag.glsl:2: 'f' : expected '<' or '\"'");
        assert_eq!(diagnostics[1].to_string(), "a.frag.glsl:3: '' : compilation terminated");

        // Written content is kept, nothing after the directive
        assert_eq!(output, "int before;\n");
    }

    #[test]
    fn test_unterminated_quote_in_include() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "a.frag.glsl", "#include \"b.glsl\"\n");
        write(&temp_dir, "b.glsl", "\n\n#include \"foo.glsl\n");

        let (_, result) = expand(&temp_dir, "a.frag.glsl");
        let err = result.unwrap_err();
        let diagnostics = err.downcast_ref::<PreprocessorError>().unwrap().diagnostics().unwrap();

        assert_eq!(diagnostics[0].to_string(), "b.glsl:3: '' : expected '\"', got EOL");
    }

    #[test]
    fn test_recursive_include() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "a.frag.glsl", "#include \"b.glsl\"\n");
        write(&temp_dir, "b.glsl", "int b;\n#include \"a.frag.glsl\"\n");

        let (_, result) = expand(&temp_dir, "a.frag.glsl");
        let err = result.unwrap_err();
        match err.downcast_ref::<PreprocessorError>() {
            Some(PreprocessorError::RecursiveInclude {
                path,
                from,
                line_number,
                stack,
            }) => {
                assert_eq!(path, "a.frag.glsl");
                assert_eq!(from, "b.glsl");
                assert_eq!(*line_number, 2);
                assert_eq!(stack, "a.frag.glsl -> b.glsl -> a.frag.glsl");
            }
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_missing_include_file() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "a.frag.glsl", "\n#include <nope.glsl>\n");

        let (_, result) = expand(&temp_dir, "a.frag.glsl");
        let err = result.unwrap_err();
        let diagnostics = err.downcast_ref::<PreprocessorError>().unwrap().diagnostics().unwrap();

        assert_eq!(
            diagnostics[0].to_string(),
            "a.frag.glsl:2: 'nope.glsl' : could not open include file"
        );
    }

    #[test]
    fn test_missing_top_level_file() {
        let temp_dir = TempDir::new().unwrap();

        let (_, result) = expand(&temp_dir, "gone.frag.glsl");
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreprocessorError>(),
            Some(PreprocessorError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_builder() {
        let preprocessor = PreprocessorBuilder::new()
            .shader_root("shaders")
            .max_include_depth(8)
            .build();
        assert_eq!(preprocessor.config().shader_root, PathBuf::from("shaders"));
        assert_eq!(preprocessor.config().build_directory, PathBuf::from("shaders/build"));
        assert_eq!(preprocessor.config().max_include_depth, 8);

        let preprocessor = PreprocessorBuilder::new()
            .build_directory("out")
            .shader_root("shaders")
            .build();
        assert_eq!(preprocessor.config().build_directory, PathBuf::from("out"));
    }
}
