//! Entry types for Papi
//!
//! `papi-entry` discovers entry type definitions (one YAML file per type),
//! decides which entry type governs a post, term or option page, and ties
//! their boxes to the property machinery in `papi-fields`.
//!
//! # Architecture
//!
//! - **Settings**: `papi.yaml`/`papi.toml` and `PAPI_*` variables, layered with figment
//! - **Registry**: discovery across stacked directories, cached until reset
//! - **Resolver**: stored pointer, request parameters, then the filter chain
//! - **Context**: one owned value wiring storage, registries and filters together

pub mod container;
pub mod context;
pub mod error;
pub mod filters;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod types;

pub use container::{post_type_key, taxonomy_key, Container};
pub use context::{EntryContext, EntryContextBuilder};
pub use error::{EntryError, Result};
pub use filters::{
    EntryTypeIdFilter, FilterChain, FilterContext, PostTypeDefaultFilter, TaxonomyTypeFilter,
    DEFAULT_PRIORITY, ENTRY_TYPE_ID_HOOK,
};
pub use registry::{EntryTypeFilter, EntryTypeRegistry};
pub use resolver::{EntryTypeRef, EntryTypeResolver};
pub use settings::{PapiSettings, DEFAULT_PAGE_TYPE_KEY};
pub use types::{BoxDef, EntryBox, EntryType, EntryTypeDef, EntryTypeKind};
