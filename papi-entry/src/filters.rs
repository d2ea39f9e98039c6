//! Named filter hooks over resolved entry type ids.
//!
//! Every id the resolver produces passes through [`ENTRY_TYPE_ID_HOOK`].
//! Filters run by ascending priority, then in registration order, each
//! receiving the previous filter's output.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use papi_fields::{MetaBackend, MetaType, RequestContext};
use serde_json::Value;
use tracing::trace;

use crate::container::{post_type_key, taxonomy_key, Container};

/// Hook every resolved entry type id passes through.
pub const ENTRY_TYPE_ID_HOOK: &str = "papi/entry_type_id";

/// Priority used by the built-in filters.
pub const DEFAULT_PRIORITY: i32 = 10;

/// What a filter may consult while resolving an id.
pub struct FilterContext<'a> {
    pub meta_type: MetaType,
    /// Id of the post or term being resolved; `0` when unknown.
    pub meta_id: u64,
    pub backend: &'a dyn MetaBackend,
    pub container: &'a Container,
    pub page_type_key: &'a str,
    pub request: &'a RequestContext,
}

impl FilterContext<'_> {
    /// The stored entry type pointer of the current post or term.
    pub fn stored_pointer(&self) -> Option<String> {
        if self.meta_id == 0 || !self.backend.supports(self.meta_type) {
            return None;
        }
        match self.backend.get(self.meta_type, self.meta_id, self.page_type_key)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// A strategy that may rewrite a resolved entry type id.
pub trait EntryTypeIdFilter: Send + Sync {
    /// Name used to find and remove the filter.
    fn name(&self) -> &str;

    fn apply(&self, entry_type_id: String, ctx: &FilterContext<'_>) -> String;
}

/// Terms: read the pointer from term meta, else fall back to the default
/// registered for the term's taxonomy.
#[derive(Debug, Default)]
pub struct TaxonomyTypeFilter;

impl EntryTypeIdFilter for TaxonomyTypeFilter {
    fn name(&self) -> &str {
        "taxonomy_type_id"
    }

    fn apply(&self, entry_type_id: String, ctx: &FilterContext<'_>) -> String {
        if ctx.meta_type != MetaType::Term {
            return entry_type_id;
        }

        let mut entry_type_id = entry_type_id;
        if ctx.meta_id > 0 && ctx.backend.supports(MetaType::Term) {
            entry_type_id = ctx.stored_pointer().unwrap_or_default();
        }

        if entry_type_id.is_empty() {
            let taxonomy = ctx
                .backend
                .object_subtype(MetaType::Term, ctx.meta_id)
                .unwrap_or_default();
            if let Some(default) = ctx.container.make_string(&taxonomy_key(&taxonomy)) {
                return default.to_string();
            }
        }

        entry_type_id
    }
}

/// Posts without a pointer: the default registered for the post's type.
#[derive(Debug, Default)]
pub struct PostTypeDefaultFilter;

impl EntryTypeIdFilter for PostTypeDefaultFilter {
    fn name(&self) -> &str {
        "post_type_default"
    }

    fn apply(&self, entry_type_id: String, ctx: &FilterContext<'_>) -> String {
        if ctx.meta_type != MetaType::Post || !entry_type_id.is_empty() || ctx.meta_id == 0 {
            return entry_type_id;
        }
        ctx.backend
            .object_subtype(MetaType::Post, ctx.meta_id)
            .and_then(|post_type| ctx.container.make_string(&post_type_key(&post_type)))
            .map(str::to_string)
            .unwrap_or(entry_type_id)
    }
}

struct Hooked {
    priority: i32,
    seq: usize,
    filter: Arc<dyn EntryTypeIdFilter>,
}

/// Filters registered per hook name.
#[derive(Default)]
pub struct FilterChain {
    hooks: HashMap<String, Vec<Hooked>>,
    next_seq: usize,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain with the built-in filters on [`ENTRY_TYPE_ID_HOOK`].
    pub fn with_defaults() -> Self {
        let mut chain = Self::new();
        chain
            .add(ENTRY_TYPE_ID_HOOK, DEFAULT_PRIORITY, TaxonomyTypeFilter)
            .add(ENTRY_TYPE_ID_HOOK, DEFAULT_PRIORITY, PostTypeDefaultFilter);
        chain
    }

    pub fn add(
        &mut self,
        hook: &str,
        priority: i32,
        filter: impl EntryTypeIdFilter + 'static,
    ) -> &mut Self {
        let seq = self.next_seq;
        self.next_seq += 1;
        let filters = self.hooks.entry(hook.to_string()).or_default();
        filters.push(Hooked {
            priority,
            seq,
            filter: Arc::new(filter),
        });
        filters.sort_by_key(|h| (h.priority, h.seq));
        self
    }

    /// Remove every filter named `name` from `hook`. Returns whether any was
    /// registered.
    pub fn remove(&mut self, hook: &str, name: &str) -> bool {
        let Some(filters) = self.hooks.get_mut(hook) else {
            return false;
        };
        let before = filters.len();
        filters.retain(|h| h.filter.name() != name);
        before != filters.len()
    }

    pub fn has(&self, hook: &str, name: &str) -> bool {
        self.hooks
            .get(hook)
            .map(|filters| filters.iter().any(|h| h.filter.name() == name))
            .unwrap_or(false)
    }

    /// Filter names on `hook` in run order.
    pub fn names(&self, hook: &str) -> Vec<String> {
        self.hooks
            .get(hook)
            .map(|filters| filters.iter().map(|h| h.filter.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Run `value` through every filter on `hook`.
    pub fn apply(&self, hook: &str, value: String, ctx: &FilterContext<'_>) -> String {
        let Some(filters) = self.hooks.get(hook) else {
            return value;
        };
        filters.iter().fold(value, |value, h| {
            let next = h.filter.apply(value, ctx);
            trace!(hook, filter = h.filter.name(), value = %next, "filter applied");
            next
        })
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks: HashMap<&str, Vec<String>> = self
            .hooks
            .keys()
            .map(|hook| (hook.as_str(), self.names(hook)))
            .collect();
        f.debug_struct("FilterChain").field("hooks", &hooks).finish()
    }
}
