//! Shader root path resolution and per-source processing state

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::{PreprocessorError, Result};
use crate::registry::FileRegistry;

/// Suffixes of the shader stages treated as top-level sources
pub const SOURCE_EXTENSIONS: [&str; 2] = [".vert.glsl", ".frag.glsl"];

/// Preprocessor configuration
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Directory all source and include paths are relative to
    pub shader_root: PathBuf,
    /// Directory flattened sources are written to
    pub build_directory: PathBuf,
    /// Max include depth to stop runaway nesting
    pub max_include_depth: usize,
    /// File name suffixes of top-level sources
    pub source_extensions: Vec<String>,
}

impl ProcessingConfig {
    /// Flattened output path for a top-level source
    pub fn output_path(&self, source_name: &str) -> PathBuf {
        self.build_directory.join(source_name)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let shader_root = PathBuf::from("glshaders");
        Self {
            build_directory: shader_root.join("build"),
            shader_root,
            max_include_depth: 100,
            source_extensions: SOURCE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

/// Where an include directive was found
#[derive(Debug, Clone)]
pub struct IncludeOrigin {
    /// Registry index of the including file
    pub index: usize,
    /// Display name of the including file
    pub display_name: String,
    /// Line of the directive
    pub line_number: usize,
}

/// Processing state for one top-level source
#[derive(Debug)]
pub struct ProcessingContext {
    /// Files seen so far, shared with diagnostic translation
    registry: FileRegistry,
    /// Stack of files being expanded (for cycle detection)
    include_stack: Vec<PathBuf>,
    /// Canonical shader root
    root: PathBuf,
    /// Config
    config: ProcessingConfig,
}

impl ProcessingContext {
    /// Create processing context
    pub fn new(config: ProcessingConfig) -> Result<Self> {
        let root = config.shader_root.canonicalize().with_context(|| {
            format!("Failed to open shader root: {}", config.shader_root.display())
        })?;

        Ok(Self {
            registry: FileRegistry::new(),
            include_stack: Vec::new(),
            root,
            config,
        })
    }

    /// Get current include depth
    pub fn current_depth(&self) -> usize {
        self.include_stack.len()
    }

    /// Enter file, rejecting cycles and excessive nesting.
    ///
    /// `file_path` must be canonical. Files may be entered again once they
    /// have been exited; only re-entry while still on the stack is an error.
    pub fn enter_file(&mut self, file_path: &Path, origin: Option<&IncludeOrigin>) -> Result<()> {
        if let Some(origin) = origin {
            let path = FileResolver::display_name(file_path, &self.root);

            if self.include_stack.iter().any(|p| p == file_path) {
                let stack = self
                    .include_stack
                    .iter()
                    .map(|p| FileResolver::display_name(p, &self.root))
                    .chain(std::iter::once(path.clone()))
                    .collect::<Vec<_>>()
                    .join(" -> ");

                return Err(PreprocessorError::RecursiveInclude {
                    path,
                    from: origin.display_name.clone(),
                    line_number: origin.line_number,
                    stack,
                }
                .into());
            }

            if self.current_depth() >= self.config.max_include_depth {
                return Err(PreprocessorError::MaxDepthExceeded {
                    path,
                    from: origin.display_name.clone(),
                    line_number: origin.line_number,
                    max_depth: self.config.max_include_depth,
                }
                .into());
            }
        }

        self.include_stack.push(file_path.to_path_buf());
        Ok(())
    }

    /// Exit file (pop from stack)
    pub fn exit_file(&mut self) {
        self.include_stack.pop();
    }

    /// Canonical shader root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_mut(&mut self) -> &mut FileRegistry {
        &mut self.registry
    }

    pub fn into_registry(self) -> FileRegistry {
        self.registry
    }
}

/// File resolver for shader sources
pub struct FileResolver;

impl FileResolver {
    /// Resolve a root-relative path to a canonical file path.
    ///
    /// Leading `/` still resolves under the root.
    pub fn resolve_path(path: &str, root: &Path) -> Result<PathBuf> {
        let relative = Path::new(path);
        let joined = if relative.is_absolute() {
            root.join(relative.strip_prefix("/").unwrap_or(relative))
        } else {
            root.join(relative)
        };

        if !joined.is_file() {
            return Err(PreprocessorError::FileNotFound { path: joined }.into());
        }

        joined
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize path: {}", joined.display()))
    }

    /// Path relative to the shader root, or the full path for files outside it
    pub fn display_name(path: &Path, root: &Path) -> String {
        path.strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Top-level sources directly under the shader root, sorted by name
    pub fn discover_sources(config: &ProcessingConfig) -> Result<Vec<String>> {
        let entries = fs::read_dir(&config.shader_root).with_context(|| {
            format!("Failed to read shader root: {}", config.shader_root.display())
        })?;

        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if config
                .source_extensions
                .iter()
                .any(|ext| name.len() > ext.len() && name.ends_with(ext.as_str()))
            {
                sources.push(name);
            }
        }

        sources.sort();
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> ProcessingConfig {
        ProcessingConfig {
            shader_root: dir.path().to_path_buf(),
            build_directory: dir.path().join("build"),
            ..Default::default()
        }
    }

    fn origin(line_number: usize) -> IncludeOrigin {
        IncludeOrigin {
            index: 0,
            display_name: "main.frag.glsl".to_string(),
            line_number,
        }
    }

    #[test]
    fn test_processing_context_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a.glsl");
        fs::write(&file_path, "").unwrap();
        let file_path = file_path.canonicalize().unwrap();

        let mut context = ProcessingContext::new(config_for(&temp_dir)).unwrap();
        assert!(context.enter_file(&file_path, None).is_ok());

        let err = context.enter_file(&file_path, Some(&origin(3))).unwrap_err();
        match err.downcast_ref::<PreprocessorError>() {
            Some(PreprocessorError::RecursiveInclude { path, stack, .. }) => {
                assert_eq!(path, "a.glsl");
                assert_eq!(stack, "a.glsl -> a.glsl");
            }
            other => panic!("{:?}", other),
        }

        // Re-entry after exit is a plain second inclusion
        context.exit_file();
        assert!(context.enter_file(&file_path, Some(&origin(3))).is_ok());
    }

    #[test]
    fn test_processing_context_max_depth() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_for(&temp_dir);
        config.max_include_depth = 1;

        let mut context = ProcessingContext::new(config).unwrap();
        assert!(context.enter_file(&temp_dir.path().join("a.glsl"), None).is_ok());

        let err = context
            .enter_file(&temp_dir.path().join("b.glsl"), Some(&origin(1)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreprocessorError>(),
            Some(PreprocessorError::MaxDepthExceeded { max_depth: 1, .. })
        ));
    }

    #[test]
    fn test_resolve_path() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("lib")).unwrap();
        fs::write(temp_dir.path().join("lib/noise.glsl"), "").unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        let resolved = FileResolver::resolve_path("lib/noise.glsl", &root).unwrap();
        assert_eq!(resolved, root.join("lib/noise.glsl"));
        assert_eq!(FileResolver::display_name(&resolved, &root), "lib/noise.glsl");

        let via_parent = FileResolver::resolve_path("lib/../lib/noise.glsl", &root).unwrap();
        assert_eq!(via_parent, resolved);

        let rooted = FileResolver::resolve_path("/lib/noise.glsl", &root).unwrap();
        assert_eq!(rooted, resolved);

        assert!(FileResolver::resolve_path("missing.glsl", &root).is_err());
        assert!(FileResolver::resolve_path("lib", &root).is_err());
    }

    #[test]
    fn test_discover_sources() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["z.frag.glsl", "a.vert.glsl", "common.glsl", "notes.txt", ".frag.glsl"] {
            fs::write(temp_dir.path().join(name), "").unwrap();
        }
        fs::create_dir(temp_dir.path().join("dir.vert.glsl")).unwrap();

        let sources = FileResolver::discover_sources(&config_for(&temp_dir)).unwrap();
        assert_eq!(sources, vec!["a.vert.glsl", "z.frag.glsl"]);
    }
}
