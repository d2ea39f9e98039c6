//! Definition file discovery across stacked search paths.
//!
//! Search paths are walked in registration order. Each file is indexed by
//! its logical name (relative path without extension); the first search path
//! that provides a name owns it and later duplicates are skipped.

use crate::error::{DirectoryError, Result};
use indexmap::IndexMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Maximum file size to load (10MB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A directory to search for definition files.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath {
    /// The directory path to search.
    pub path: PathBuf,
    /// Registration order; lower ranks win on name collisions.
    pub rank: usize,
}

/// A discovered definition file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// The logical name of the file (relative path without extension).
    pub name: String,
    /// The full path to the file.
    pub path: PathBuf,
    /// The file content.
    pub content: String,
    /// Rank of the search path the file came from.
    pub rank: usize,
}

impl FileEntry {
    /// Create a new FileEntry with explicit name.
    pub fn new(name: impl Into<String>, path: PathBuf, content: String, rank: usize) -> Self {
        Self {
            name: name.into(),
            path,
            content,
            rank,
        }
    }

    /// Create a FileEntry from a path under `root`, deriving the name from the
    /// relative path.
    pub fn from_path_and_content(root: &Path, path: PathBuf, content: String, rank: usize) -> Self {
        let name = logical_name(root, &path);
        Self {
            name,
            path,
            content,
            rank,
        }
    }
}

/// Logical name of `path` relative to `root`: extension dropped, components
/// joined with `/`. Falls back to the file stem when `path` is not under `root`.
fn logical_name(root: &Path, path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let Ok(relative) = path.strip_prefix(root) else {
        return stem;
    };

    let mut components: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(os) => os.to_str().map(str::to_string),
            _ => None,
        })
        .collect();

    if components.pop().is_none() {
        return stem;
    }
    components.push(stem);
    components.join("/")
}

/// Read a single definition file, enforcing the size limit.
pub fn read_definition(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path).map_err(|e| DirectoryError::file_read(path, e))?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(DirectoryError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: MAX_FILE_SIZE,
        });
    }
    std::fs::read_to_string(path).map_err(|e| DirectoryError::file_read(path, e))
}

/// Definition files indexed by logical name, in discovery order.
#[derive(Debug)]
pub struct DefinitionFiles {
    extensions: Vec<String>,
    files: IndexMap<String, FileEntry>,
    search_paths: Vec<SearchPath>,
}

impl DefinitionFiles {
    /// Create an empty index accepting the given file extensions.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            files: IndexMap::new(),
            search_paths: Vec::new(),
        }
    }

    /// Index accepting `.yaml` and `.yml` files.
    pub fn yaml() -> Self {
        Self::new(["yaml", "yml"])
    }

    /// Register a search path. Earlier registrations take precedence.
    pub fn add_search_path(&mut self, path: PathBuf) {
        let rank = self.search_paths.len();
        self.search_paths.push(SearchPath { path, rank });
    }

    /// The registered search paths, in precedence order.
    pub fn search_paths(&self) -> &[SearchPath] {
        &self.search_paths
    }

    /// Add a file entry unless its name is already taken.
    ///
    /// Returns `false` when the entry was shadowed by an earlier one.
    pub fn add_file(&mut self, entry: FileEntry) -> bool {
        if let Some(existing) = self.files.get(&entry.name) {
            tracing::debug!(
                name = %entry.name,
                kept = %existing.path.display(),
                skipped = %entry.path.display(),
                "definition shadowed by earlier search path"
            );
            return false;
        }
        self.files.insert(entry.name.clone(), entry);
        true
    }

    /// Get a file by logical name.
    pub fn get(&self, name: &str) -> Option<&FileEntry> {
        self.files.get(name)
    }

    /// All files in discovery order.
    pub fn list(&self) -> Vec<&FileEntry> {
        self.files.values().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Drop all discovered files, keeping the search paths.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Walk every search path in order and index the files found.
    pub fn load_all(&mut self) -> Result<()> {
        let paths = self.search_paths.clone();
        for sp in &paths {
            self.load_files_from_dir(&sp.path, sp.rank)?;
        }
        tracing::debug!(
            files = self.files.len(),
            search_paths = paths.len(),
            "definition files loaded"
        );
        Ok(())
    }

    /// Load files from one directory with the given rank.
    pub fn load_files_from_dir(&mut self, target_dir: &Path, rank: usize) -> Result<()> {
        if !target_dir.is_dir() {
            tracing::debug!(dir = %target_dir.display(), "skipping missing search path");
            return Ok(());
        }

        let file_paths: Vec<PathBuf> = WalkDir::new(target_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.path().to_path_buf())
            .filter(|path| self.accepts(path))
            .collect();

        for path in file_paths {
            if !Self::is_path_safe(&path, target_dir) {
                tracing::warn!("Skipping file '{}' - path validation failed", path.display());
                continue;
            }

            match read_definition(&path) {
                Ok(content) => {
                    let entry = FileEntry::from_path_and_content(target_dir, path, content, rank);
                    self.add_file(entry);
                }
                Err(e) => {
                    tracing::warn!("Skipping definition file: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Search paths that currently exist on disk.
    pub fn directories(&self) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .filter(|sp| sp.path.is_dir())
            .map(|sp| sp.path.clone())
            .collect()
    }

    /// The first search path containing `path`, if any.
    pub fn search_path_for(&self, path: &Path) -> Option<&SearchPath> {
        let canonical = path.canonicalize().ok();
        self.search_paths.iter().find(|sp| {
            if path.starts_with(&sp.path) {
                return true;
            }
            match (&canonical, sp.path.canonicalize()) {
                (Some(p), Ok(base)) => p.starts_with(base),
                _ => false,
            }
        })
    }

    /// Logical name for an arbitrary file path.
    ///
    /// Relative to the first search path that contains it, or the bare file
    /// stem when no search path does.
    pub fn name_for(&self, path: &Path) -> String {
        match self.search_path_for(path) {
            Some(sp) => {
                if path.starts_with(&sp.path) {
                    logical_name(&sp.path, path)
                } else {
                    match (path.canonicalize(), sp.path.canonicalize()) {
                        (Ok(p), Ok(base)) => logical_name(&base, &p),
                        _ => logical_name(&sp.path, path),
                    }
                }
            }
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }

    /// Validate that a path is safe and within the expected directory.
    fn is_path_safe(path: &Path, base_dir: &Path) -> bool {
        match (path.canonicalize(), base_dir.canonicalize()) {
            (Ok(canonical_path), Ok(canonical_base)) => canonical_path.starts_with(&canonical_base),
            _ => {
                let path_str = path.to_string_lossy();
                !path_str.contains("..") && !path_str.contains('~')
            }
        }
    }
}
