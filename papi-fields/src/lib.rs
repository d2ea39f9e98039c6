//! Property types, key codec and meta storage for Papi entry types
//!
//! `papi-fields` owns everything between a declared property and the flat
//! key-value storage behind it. It knows nothing about entry types; the
//! `papi-entry` crate feeds it declarations.
//!
//! # Architecture
//!
//! - **Key codec**: slug to storage key transforms, type keys, and the flat
//!   repeater encoding
//! - **Meta stores**: post, term and option bindings over a host [`MetaBackend`]
//! - **Property types**: a registry of handlers keyed by type tag
//! - **Property context**: builds, materializes, populates and saves properties

pub mod codec;
pub mod context;
pub mod error;
pub mod persist;
pub mod property_type;
pub mod render;
pub mod request;
pub mod store;
pub mod types;

pub use context::{load_fragment, slugify, PropertyContext, PropertySource, DEFAULT_SORT_ORDER};
pub use error::{FieldsError, Result};
pub use persist::{persist, persist_to};
pub use property_type::{
    class_name_for, default_options, short_type, PropertyType, PropertyTypeRegistry, TypeRef,
};
pub use render::{render_properties, render_property, CollectingRenderer, PropertyRenderer, Widget};
pub use request::RequestContext;
pub use store::{
    meta_store, meta_store_for, InMemoryBackend, MetaBackend, MetaStore, MetaType, OptionStore,
    PostStore, TermStore,
};
pub use types::{is_empty_value, is_truthy, Declarations, MetaEnvelope, Property, PropertyEntry};
