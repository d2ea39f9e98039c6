//! Search-path stacking for definition directories.
//!
//! Entry type definitions live in one or more configured directories. This
//! crate walks those directories in registration order and indexes every
//! definition file by a stable logical name: its path relative to the search
//! directory, without extension, `/`-separated.
//!
//! # Precedence
//!
//! The first directory registered wins. A file whose logical name was already
//! seen in an earlier directory is shadowed and skipped, so discovery is a
//! deterministic function of the search-path order.
//!
//! # Example
//!
//! ```no_run
//! use papi_directory::DefinitionFiles;
//! use std::path::PathBuf;
//!
//! let mut files = DefinitionFiles::yaml();
//! files.add_search_path(PathBuf::from("/site/entry-types"));
//! files.add_search_path(PathBuf::from("/plugin/entry-types"));
//! files.load_all()?;
//!
//! for file in files.list() {
//!     println!("{} -> {}", file.name, file.path.display());
//! }
//! # Ok::<(), papi_directory::DirectoryError>(())
//! ```

mod error;
mod file_loader;

pub use error::{DirectoryError, Result};
pub use file_loader::{read_definition, DefinitionFiles, FileEntry, SearchPath, MAX_FILE_SIZE};
