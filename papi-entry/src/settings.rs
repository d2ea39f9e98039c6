//! Settings loaded with figment.
//!
//! Sources in precedence order (later sources override earlier ones):
//! 1. Default values
//! 2. `papi.yaml` then `papi.toml` in the root directory, when present
//! 3. Environment variables prefixed `PAPI_`

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Meta key holding the entry type pointer of a post or term.
pub const DEFAULT_PAGE_TYPE_KEY: &str = "_papi_page_type";

/// Library settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PapiSettings {
    /// Directories searched for entry type definitions, in precedence order.
    pub directories: Vec<PathBuf>,
    pub page_type_key: String,
    /// Order used for entry types and properties that declare none.
    pub default_sort_order: i64,
}

impl Default for PapiSettings {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            page_type_key: DEFAULT_PAGE_TYPE_KEY.to_string(),
            default_sort_order: papi_fields::DEFAULT_SORT_ORDER,
        }
    }
}

impl PapiSettings {
    /// The layered figment for settings rooted at `root`.
    pub fn figment(root: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(PapiSettings::default()))
            .merge(Yaml::file(root.join("papi.yaml")))
            .merge(Toml::file(root.join("papi.toml")))
            .merge(Env::prefixed("PAPI_"))
    }

    /// Load settings from files under `root` and the environment.
    ///
    /// Relative `directories` are resolved against `root`.
    pub fn load_from(root: &Path) -> Result<Self> {
        let mut settings: PapiSettings = Self::figment(root).extract()?;
        settings.directories = settings
            .directories
            .into_iter()
            .map(|dir| if dir.is_relative() { root.join(dir) } else { dir })
            .collect();
        debug!(
            root = %root.display(),
            directories = settings.directories.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    /// Load settings rooted at the current directory.
    pub fn load() -> Result<Self> {
        let root = std::env::current_dir()?;
        Self::load_from(&root)
    }
}
