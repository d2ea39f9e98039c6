//! Entry type discovery and lookup.
//!
//! Definitions are discovered across the configured directories on first
//! access and cached until [`EntryTypeRegistry::reset`].

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use papi_directory::{read_definition, DefinitionFiles};
use tracing::{debug, warn};

use crate::settings::PapiSettings;
use crate::types::{EntryType, EntryTypeKind};

/// Restricts [`EntryTypeRegistry::all_types`] to some kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTypeFilter {
    /// Kinds to keep; empty keeps every kind.
    pub types: Vec<EntryTypeKind>,
}

impl EntryTypeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(types: impl IntoIterator<Item = EntryTypeKind>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    pub fn matches(&self, entry_type: &EntryType) -> bool {
        self.types.is_empty() || self.types.contains(&entry_type.kind)
    }
}

/// Discovers entry types in the configured directories.
#[derive(Debug)]
pub struct EntryTypeRegistry {
    directories: Vec<PathBuf>,
    default_sort_order: i64,
    cache: OnceCell<Vec<EntryType>>,
}

impl EntryTypeRegistry {
    /// A registry over `directories`, in precedence order.
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            default_sort_order: papi_fields::DEFAULT_SORT_ORDER,
            cache: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &PapiSettings) -> Self {
        Self {
            directories: settings.directories.clone(),
            default_sort_order: settings.default_sort_order,
            cache: OnceCell::new(),
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Replace the search directories and drop the cache.
    pub fn set_directories(&mut self, directories: Vec<PathBuf>) {
        self.directories = directories;
        self.reset();
    }

    /// Append a lower-precedence search directory and drop the cache.
    pub fn add_directory(&mut self, directory: impl Into<PathBuf>) {
        self.directories.push(directory.into());
        self.reset();
    }

    /// Forget discovered entry types; the next lookup rescans.
    pub fn reset(&mut self) {
        if self.cache.take().is_some() {
            debug!("entry type cache reset");
        }
    }

    fn definition_files(&self) -> DefinitionFiles {
        let mut files = DefinitionFiles::yaml();
        for directory in &self.directories {
            files.add_search_path(directory.clone());
        }
        files
    }

    fn discover(&self) -> Vec<EntryType> {
        let mut files = self.definition_files();
        if let Err(e) = files.load_all() {
            warn!(error = %e, "entry type discovery failed");
            return Vec::new();
        }

        let mut types: Vec<EntryType> = files
            .list()
            .into_iter()
            .filter_map(|file| {
                let root = files.search_paths().get(file.rank)?.path.clone();
                match EntryType::from_yaml(
                    file.name.clone(),
                    &file.path,
                    &root,
                    &file.content,
                    self.default_sort_order,
                ) {
                    Ok(entry_type) => entry_type,
                    Err(e) => {
                        warn!(path = %file.path.display(), error = %e, "skipping entry type");
                        None
                    }
                }
            })
            .collect();

        types.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        debug!(count = types.len(), "entry types discovered");
        types
    }

    fn cached(&self) -> &[EntryType] {
        self.cache.get_or_init(|| self.discover())
    }

    /// Every discovered entry type matching `filter`, ordered by sort order
    /// then name.
    pub fn all_types(&self, filter: &EntryTypeFilter) -> Vec<EntryType> {
        self.cached()
            .iter()
            .filter(|entry_type| filter.matches(entry_type))
            .cloned()
            .collect()
    }

    /// The entry type with `id`. An id naming a `.yaml` file is loaded from
    /// that file directly.
    pub fn by_id(&self, id: &str) -> Option<EntryType> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }

        let path = Path::new(id);
        if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")) && path.is_file() {
            return self.by_file_path(path);
        }

        self.cached().iter().find(|entry_type| entry_type.id == id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.by_id(id).is_some()
    }

    /// Load one definition file, bypassing the cache.
    ///
    /// `None` for fragments and unreadable or malformed files.
    pub fn by_file_path(&self, path: &Path) -> Option<EntryType> {
        let files = self.definition_files();
        let id = files.name_for(path);
        let root = match files.search_path_for(path) {
            Some(search_path) => search_path.path.clone(),
            None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let content = match read_definition(path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "entry type file not readable");
                return None;
            }
        };

        match EntryType::from_yaml(id, path, &root, &content, self.default_sort_order) {
            Ok(entry_type) => entry_type,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping entry type");
                None
            }
        }
    }
}
