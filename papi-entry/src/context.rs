//! The assembled library: settings, storage, registries and filters.

use std::path::PathBuf;
use std::sync::Arc;

use papi_fields::{
    meta_store, InMemoryBackend, MetaBackend, MetaStore, MetaType, Property, PropertyContext,
    PropertyType, PropertyTypeRegistry, RequestContext,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::container::Container;
use crate::error::Result;
use crate::filters::FilterChain;
use crate::registry::{EntryTypeFilter, EntryTypeRegistry};
use crate::resolver::{EntryTypeRef, EntryTypeResolver};
use crate::settings::PapiSettings;
use crate::types::EntryType;

/// Builder for [`EntryContext`]. Created by [`EntryContext::open`].
pub struct EntryContextBuilder {
    root: PathBuf,
    settings: Option<PapiSettings>,
    backend: Option<Arc<dyn MetaBackend>>,
    property_types: PropertyTypeRegistry,
}

impl EntryContextBuilder {
    /// Use these settings instead of loading them from the root.
    pub fn with_settings(mut self, settings: PapiSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Storage backend; defaults to an in-memory backend.
    pub fn with_backend(mut self, backend: Arc<dyn MetaBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Register an extra property type next to the built-ins.
    pub fn with_property_type(mut self, handler: impl PropertyType + 'static) -> Self {
        self.property_types.register(handler);
        self
    }

    pub fn build(self) -> Result<EntryContext> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => PapiSettings::load_from(&self.root)?,
        };
        let backend: Arc<dyn MetaBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(InMemoryBackend::new()),
        };

        info!(
            root = %self.root.display(),
            directories = settings.directories.len(),
            property_types = self.property_types.type_names().len(),
            "papi context ready"
        );

        Ok(EntryContext {
            entry_types: EntryTypeRegistry::from_settings(&settings),
            settings,
            backend,
            property_types: self.property_types,
            container: Container::new(),
            filters: FilterChain::with_defaults(),
        })
    }
}

/// Owns everything needed to resolve entry types and read or write their
/// property values.
pub struct EntryContext {
    settings: PapiSettings,
    backend: Arc<dyn MetaBackend>,
    property_types: PropertyTypeRegistry,
    entry_types: EntryTypeRegistry,
    container: Container,
    filters: FilterChain,
}

impl EntryContext {
    /// Start building a context whose settings live under `root`.
    pub fn open(root: impl Into<PathBuf>) -> EntryContextBuilder {
        EntryContextBuilder {
            root: root.into(),
            settings: None,
            backend: None,
            property_types: PropertyTypeRegistry::with_builtins(),
        }
    }

    /// A context from explicit settings and backend.
    pub fn new(settings: PapiSettings, backend: Arc<dyn MetaBackend>) -> Self {
        Self {
            entry_types: EntryTypeRegistry::from_settings(&settings),
            settings,
            backend,
            property_types: PropertyTypeRegistry::with_builtins(),
            container: Container::new(),
            filters: FilterChain::with_defaults(),
        }
    }

    pub fn settings(&self) -> &PapiSettings {
        &self.settings
    }

    pub fn backend(&self) -> Arc<dyn MetaBackend> {
        self.backend.clone()
    }

    pub fn property_types(&self) -> &PropertyTypeRegistry {
        &self.property_types
    }

    pub fn property_types_mut(&mut self) -> &mut PropertyTypeRegistry {
        &mut self.property_types
    }

    pub fn entry_types(&self) -> &EntryTypeRegistry {
        &self.entry_types
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }

    /// Replace the search directories; discovery reruns on next access.
    pub fn set_directories(&mut self, directories: Vec<PathBuf>) {
        self.settings.directories = directories.clone();
        self.entry_types.set_directories(directories);
    }

    /// Drop discovered entry types.
    pub fn reset_entry_types(&mut self) {
        self.entry_types.reset();
    }

    pub fn resolver(&self) -> EntryTypeResolver<'_> {
        EntryTypeResolver::new(
            &self.entry_types,
            self.backend.as_ref(),
            &self.container,
            &self.filters,
            &self.settings.page_type_key,
        )
    }

    // --- Entry types ---

    pub fn all_entry_types(&self, filter: &EntryTypeFilter) -> Vec<EntryType> {
        self.entry_types.all_types(filter)
    }

    pub fn entry_type_by_id(&self, id: &str) -> Option<EntryType> {
        self.entry_types.by_id(id)
    }

    pub fn entry_type_exists(&self, id: &str) -> bool {
        self.entry_types.exists(id)
    }

    pub fn entry_type_id(&self, id: u64, meta_type: MetaType, request: &RequestContext) -> String {
        self.resolver().entry_type_id(id, meta_type, request)
    }

    pub fn entry_type_by_meta_id(
        &self,
        id: u64,
        meta_type: MetaType,
        request: &RequestContext,
    ) -> Option<EntryType> {
        self.resolver().entry_type_by_meta_id(id, meta_type, request)
    }

    pub fn entry_type_count<'r>(&self, entry_type: impl Into<EntryTypeRef<'r>>) -> usize {
        self.resolver().entry_type_count(entry_type)
    }

    pub fn entry_type_template(
        &self,
        id: u64,
        meta_type: MetaType,
        request: &RequestContext,
    ) -> Option<String> {
        self.resolver().entry_type_template(id, meta_type, request)
    }

    pub fn taxonomy_type_id(&self, term_id: u64, request: &RequestContext) -> String {
        self.resolver().taxonomy_type_id(term_id, request)
    }

    /// Point a post or term at an entry type. Options carry no pointer and
    /// an empty id removes it.
    pub fn set_entry_type_id(&self, id: u64, meta_type: MetaType, entry_type_id: &str) {
        if meta_type == MetaType::Option || id == 0 {
            return;
        }
        let key = self.settings.page_type_key.as_str();
        if entry_type_id.is_empty() {
            self.backend.delete(meta_type, id, key);
        } else {
            self.backend
                .set(meta_type, id, key, Value::String(entry_type_id.to_string()));
        }
        debug!(meta_type = %meta_type, id, entry_type_id, "entry type pointer updated");
    }

    // --- Property values ---

    /// The store for `id` in `meta_type`.
    pub fn store(&self, id: u64, meta_type: MetaType) -> Box<dyn MetaStore> {
        meta_store(self.backend.clone(), id, meta_type)
    }

    /// A property context without storage.
    pub fn property_context(&self) -> PropertyContext<'_> {
        PropertyContext::new(&self.property_types)
            .with_default_sort_order(self.settings.default_sort_order)
    }

    /// Properties of the entry type governing `id`, with stored values.
    pub fn properties_for(
        &self,
        id: u64,
        meta_type: MetaType,
        request: &RequestContext,
    ) -> Vec<Property> {
        let Some(entry_type) = self.entry_type_by_meta_id(id, meta_type, request) else {
            return Vec::new();
        };
        let id = self.meta_id(id, meta_type, request);
        let store = self.store(id, meta_type);
        entry_type.properties(&self.property_context().with_store(store.as_ref()))
    }

    /// Save `value` for the property `slug` of the entry type governing
    /// `id`. False when there is no such entry type or property.
    pub fn save_property(
        &self,
        id: u64,
        meta_type: MetaType,
        request: &RequestContext,
        slug: &str,
        value: Value,
    ) -> bool {
        let Some(entry_type) = self.entry_type_by_meta_id(id, meta_type, request) else {
            return false;
        };
        let Some(property) = entry_type.property(&self.property_context(), slug) else {
            debug!(entry_type = %entry_type.id, slug, "no such property");
            return false;
        };
        let id = self.meta_id(id, meta_type, request);
        let store = self.store(id, meta_type);
        self.property_context()
            .with_store(store.as_ref())
            .save(&property, value)
    }

    fn meta_id(&self, id: u64, meta_type: MetaType, request: &RequestContext) -> u64 {
        if id == 0 {
            request.meta_id(meta_type).unwrap_or(0)
        } else {
            id
        }
    }
}
