//! Registry of files touched while expanding one source

use std::path::{Path, PathBuf};

/// A file known to the registry
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredFile {
    /// Canonical path on disk
    pub path: PathBuf,
    /// Path relative to the shader root, used in diagnostics
    pub display_name: String,
    /// Index of the file that first included this one
    pub included_from: Option<usize>,
}

/// Maps every distinct file of one expansion pass to a stable index.
///
/// Indices are assigned in first-encounter order, so index 0 is always the
/// top-level source. The same indices appear in the `#line` markers of the
/// flattened output and in the validator's diagnostics.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: Vec<RegisteredFile>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `path`, registering it if this is its first encounter.
    ///
    /// `included_from` is only recorded on first registration.
    pub fn register(
        &mut self,
        path: &Path,
        display_name: impl Into<String>,
        included_from: Option<usize>,
    ) -> usize {
        if let Some(index) = self.index_of(path) {
            return index;
        }

        self.files.push(RegisteredFile {
            path: path.to_path_buf(),
            display_name: display_name.into(),
            included_from,
        });
        self.files.len() - 1
    }

    pub fn index_of(&self, path: &Path) -> Option<usize> {
        self.files.iter().position(|file| file.path == path)
    }

    pub fn get(&self, index: usize) -> Option<&RegisteredFile> {
        self.files.get(index)
    }

    pub fn display_name(&self, index: usize) -> Option<&str> {
        self.get(index).map(|file| file.display_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredFile> {
        self.files.iter()
    }

    /// Files that led to the inclusion of `index`, nearest includer first.
    pub fn include_chain(&self, index: usize) -> IncludeChain<'_> {
        IncludeChain {
            registry: self,
            next: self.get(index).and_then(|file| file.included_from),
        }
    }
}

/// Iterator over the includers of a registered file
pub struct IncludeChain<'a> {
    registry: &'a FileRegistry,
    next: Option<usize>,
}

impl<'a> Iterator for IncludeChain<'a> {
    type Item = &'a RegisteredFile;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.registry.get(self.next?)?;
        self.next = file.included_from;
        Some(file)
    }
}
