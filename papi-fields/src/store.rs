//! Meta storage: the flat key-value backing for property values.
//!
//! A [`MetaBackend`] is the host CMS storage (post meta, term meta and
//! options, all flat `key -> value`). A [`MetaStore`] binds one domain and
//! one id on top of a backend and applies that domain's key convention:
//!
//! - [`PostStore`] and [`TermStore`] store keys without the `papi_` namespace.
//! - [`OptionStore`] shares one global key space, so every key is namespaced
//!   and type keys are always hidden.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::codec;

/// Storage domain of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaType {
    #[default]
    Post,
    Term,
    Option,
}

impl MetaType {
    /// Parse a domain name, accepting the `page` and `taxonomy` aliases.
    pub fn parse(name: &str) -> Option<MetaType> {
        match name.trim().to_lowercase().as_str() {
            "post" | "page" => Some(MetaType::Post),
            "term" | "taxonomy" => Some(MetaType::Term),
            "option" => Some(MetaType::Option),
            _ => None,
        }
    }

    /// The id column name for this domain; options have none.
    pub fn id_column(&self) -> Option<&'static str> {
        match self {
            MetaType::Post => Some("post_id"),
            MetaType::Term => Some("term_id"),
            MetaType::Option => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaType::Post => "post",
            MetaType::Term => "term",
            MetaType::Option => "option",
        }
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetaType::parse(s).ok_or_else(|| format!("unknown meta type: {s}"))
    }
}

/// The host storage engine. Options use id `0`.
pub trait MetaBackend: Send + Sync {
    fn get(&self, meta_type: MetaType, id: u64, key: &str) -> Option<Value>;

    fn set(&self, meta_type: MetaType, id: u64, key: &str, value: Value);

    fn delete(&self, meta_type: MetaType, id: u64, key: &str);

    /// All keys stored for one entry.
    fn keys(&self, meta_type: MetaType, id: u64) -> Vec<String>;

    /// Number of entries in `meta_type` whose `key` holds exactly `value`.
    fn count_where(&self, meta_type: MetaType, key: &str, value: &Value) -> usize;

    /// Post type of a post or taxonomy of a term.
    fn object_subtype(&self, meta_type: MetaType, id: u64) -> Option<String>;

    /// Whether this backend can store metadata for `meta_type`.
    fn supports(&self, _meta_type: MetaType) -> bool {
        true
    }
}

/// In-memory backend used by tests and embedders without a database.
#[derive(Debug)]
pub struct InMemoryBackend {
    values: DashMap<(MetaType, u64, String), Value>,
    subtypes: DashMap<(MetaType, u64), String>,
    term_meta: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            subtypes: DashMap::new(),
            term_meta: true,
        }
    }

    /// A backend that reports no term-meta support.
    pub fn without_term_meta() -> Self {
        Self {
            term_meta: false,
            ..Self::new()
        }
    }

    /// Record the post type of a post or the taxonomy of a term.
    pub fn set_subtype(&self, meta_type: MetaType, id: u64, subtype: impl Into<String>) {
        self.subtypes.insert((meta_type, id), subtype.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaBackend for InMemoryBackend {
    fn get(&self, meta_type: MetaType, id: u64, key: &str) -> Option<Value> {
        self.values
            .get(&(meta_type, id, key.to_string()))
            .map(|v| v.value().clone())
    }

    fn set(&self, meta_type: MetaType, id: u64, key: &str, value: Value) {
        self.values.insert((meta_type, id, key.to_string()), value);
    }

    fn delete(&self, meta_type: MetaType, id: u64, key: &str) {
        self.values.remove(&(meta_type, id, key.to_string()));
    }

    fn keys(&self, meta_type: MetaType, id: u64) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|entry| entry.key().0 == meta_type && entry.key().1 == id)
            .map(|entry| entry.key().2.clone())
            .collect();
        keys.sort();
        keys
    }

    fn count_where(&self, meta_type: MetaType, key: &str, value: &Value) -> usize {
        self.values
            .iter()
            .filter(|entry| {
                let (t, _, k) = entry.key();
                *t == meta_type && k == key && entry.value() == value
            })
            .count()
    }

    fn object_subtype(&self, meta_type: MetaType, id: u64) -> Option<String> {
        self.subtypes.get(&(meta_type, id)).map(|s| s.value().clone())
    }

    fn supports(&self, meta_type: MetaType) -> bool {
        meta_type != MetaType::Term || self.term_meta
    }
}

/// Key-value access for one entry in one domain.
///
/// Keys passed in are logical keys; each binding maps them onto its storage
/// key convention with [`MetaStore::storage_key`].
pub trait MetaStore {
    fn meta_type(&self) -> MetaType;

    fn id(&self) -> u64;

    fn backend(&self) -> &dyn MetaBackend;

    /// Map a logical key onto the stored key.
    fn storage_key(&self, key: &str) -> String;

    /// Map a stored key back onto a logical key, or `None` when the key is
    /// not managed by this binding.
    fn logical_key(&self, stored: &str) -> Option<String>;

    /// The stored type key for `slug`.
    fn type_key(&self, slug: &str) -> String {
        codec::property_type_key_hidden(slug, self.meta_type() == MetaType::Option)
    }

    fn get(&self, key: &str) -> Option<Value> {
        let stored = self.storage_key(key);
        trace!(meta_type = %self.meta_type(), id = self.id(), key = %stored, "meta get");
        self.backend().get(self.meta_type(), self.id(), &stored)
    }

    fn set(&self, key: &str, value: Value) {
        let stored = self.storage_key(key);
        trace!(meta_type = %self.meta_type(), id = self.id(), key = %stored, "meta set");
        self.backend().set(self.meta_type(), self.id(), &stored, value);
    }

    fn delete(&self, key: &str) {
        let stored = self.storage_key(key);
        trace!(meta_type = %self.meta_type(), id = self.id(), key = %stored, "meta delete");
        self.backend().delete(self.meta_type(), self.id(), &stored);
    }

    /// Logical keys currently stored for this entry.
    fn keys(&self) -> Vec<String> {
        self.backend()
            .keys(self.meta_type(), self.id())
            .iter()
            .filter_map(|k| self.logical_key(k))
            .collect()
    }
}

/// Post meta binding.
#[derive(Clone)]
pub struct PostStore {
    backend: Arc<dyn MetaBackend>,
    id: u64,
}

impl PostStore {
    pub fn new(backend: Arc<dyn MetaBackend>, id: u64) -> Self {
        Self { backend, id }
    }
}

impl MetaStore for PostStore {
    fn meta_type(&self) -> MetaType {
        MetaType::Post
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn backend(&self) -> &dyn MetaBackend {
        self.backend.as_ref()
    }

    fn storage_key(&self, key: &str) -> String {
        codec::without_namespace(key)
    }

    fn logical_key(&self, stored: &str) -> Option<String> {
        Some(stored.to_string())
    }
}

/// Term meta binding.
#[derive(Clone)]
pub struct TermStore {
    backend: Arc<dyn MetaBackend>,
    id: u64,
}

impl TermStore {
    pub fn new(backend: Arc<dyn MetaBackend>, id: u64) -> Self {
        Self { backend, id }
    }
}

impl MetaStore for TermStore {
    fn meta_type(&self) -> MetaType {
        MetaType::Term
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn backend(&self) -> &dyn MetaBackend {
        self.backend.as_ref()
    }

    fn storage_key(&self, key: &str) -> String {
        codec::without_namespace(key)
    }

    fn logical_key(&self, stored: &str) -> Option<String> {
        Some(stored.to_string())
    }
}

/// Option storage binding. All options live under id `0`.
#[derive(Clone)]
pub struct OptionStore {
    backend: Arc<dyn MetaBackend>,
}

impl OptionStore {
    pub fn new(backend: Arc<dyn MetaBackend>) -> Self {
        Self { backend }
    }
}

impl MetaStore for OptionStore {
    fn meta_type(&self) -> MetaType {
        MetaType::Option
    }

    fn id(&self) -> u64 {
        0
    }

    fn backend(&self) -> &dyn MetaBackend {
        self.backend.as_ref()
    }

    fn storage_key(&self, key: &str) -> String {
        let namespaced = codec::with_namespace(key);
        if codec::is_property_type_key(&namespaced) {
            codec::hidden(&namespaced)
        } else {
            namespaced
        }
    }

    fn logical_key(&self, stored: &str) -> Option<String> {
        let stripped = codec::without_namespace(stored);
        (stripped != stored).then_some(stripped)
    }
}

/// Bind a store for `id` in `meta_type`.
pub fn meta_store(backend: Arc<dyn MetaBackend>, id: u64, meta_type: MetaType) -> Box<dyn MetaStore> {
    match meta_type {
        MetaType::Post => Box::new(PostStore::new(backend, id)),
        MetaType::Term => Box::new(TermStore::new(backend, id)),
        MetaType::Option => Box::new(OptionStore::new(backend)),
    }
}

/// Bind a store from a domain name; `None` for unknown domains.
pub fn meta_store_for(backend: Arc<dyn MetaBackend>, id: u64, name: &str) -> Option<Box<dyn MetaStore>> {
    MetaType::parse(name).map(|meta_type| meta_store(backend, id, meta_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> Arc<dyn MetaBackend> {
        Arc::new(InMemoryBackend::new())
    }

    #[test]
    fn test_meta_type_parse() {
        assert_eq!(MetaType::parse("post"), Some(MetaType::Post));
        assert_eq!(MetaType::parse("page"), Some(MetaType::Post));
        assert_eq!(MetaType::parse("term"), Some(MetaType::Term));
        assert_eq!(MetaType::parse("taxonomy"), Some(MetaType::Term));
        assert_eq!(MetaType::parse("option"), Some(MetaType::Option));
        assert_eq!(MetaType::parse("hello"), None);
        assert_eq!(MetaType::default(), MetaType::Post);
        assert!("fake".parse::<MetaType>().is_err());
    }

    #[test]
    fn test_id_column() {
        assert_eq!(MetaType::Post.id_column(), Some("post_id"));
        assert_eq!(MetaType::Term.id_column(), Some("term_id"));
        assert_eq!(MetaType::Option.id_column(), None);
    }

    #[test]
    fn test_meta_store_for() {
        let b = backend();
        assert_eq!(
            meta_store_for(b.clone(), 1, "post").unwrap().meta_type(),
            MetaType::Post
        );
        assert_eq!(
            meta_store_for(b.clone(), 0, "option").unwrap().meta_type(),
            MetaType::Option
        );
        assert_eq!(
            meta_store_for(b.clone(), 2, "term").unwrap().meta_type(),
            MetaType::Term
        );
        assert!(meta_store_for(b, 1, "fake").is_none());
    }

    #[test]
    fn test_post_store_strips_namespace() {
        let b = backend();
        let store = PostStore::new(b.clone(), 7);
        store.set("papi_name", json!("Fredrik"));
        assert_eq!(b.get(MetaType::Post, 7, "name"), Some(json!("Fredrik")));
        assert_eq!(store.get("name"), Some(json!("Fredrik")));
        assert_eq!(store.type_key("name"), "_name_property");
        store.delete("name");
        assert_eq!(store.get("name"), None);
    }

    #[test]
    fn test_option_store_namespaces_keys() {
        let b = backend();
        let store = OptionStore::new(b.clone());
        store.set("name", json!("site"));
        store.set("name_property", json!("string"));
        assert_eq!(b.get(MetaType::Option, 0, "papi_name"), Some(json!("site")));
        assert_eq!(
            b.get(MetaType::Option, 0, "_papi_name_property"),
            Some(json!("string"))
        );
        assert_eq!(store.type_key("name"), "_name_property");
        assert_eq!(store.storage_key(&store.type_key("name")), "_papi_name_property");
    }

    #[test]
    fn test_option_store_keys_skip_foreign_options() {
        let b = backend();
        b.set(MetaType::Option, 0, "blogname", json!("Site"));
        let store = OptionStore::new(b.clone());
        store.set("name", json!("x"));
        assert_eq!(store.keys(), vec!["name".to_string()]);
    }

    #[test]
    fn test_stores_are_isolated_by_id_and_domain() {
        let b = backend();
        PostStore::new(b.clone(), 1).set("name", json!("post"));
        TermStore::new(b.clone(), 1).set("name", json!("term"));
        assert_eq!(PostStore::new(b.clone(), 1).get("name"), Some(json!("post")));
        assert_eq!(TermStore::new(b.clone(), 1).get("name"), Some(json!("term")));
        assert_eq!(PostStore::new(b, 2).get("name"), None);
    }

    #[test]
    fn test_count_where() {
        let b = InMemoryBackend::new();
        b.set(MetaType::Post, 1, "_papi_page_type", json!("simple-page-type"));
        b.set(MetaType::Post, 2, "_papi_page_type", json!("other"));
        b.set(MetaType::Term, 3, "_papi_page_type", json!("simple-page-type"));
        let value = json!("simple-page-type");
        assert_eq!(b.count_where(MetaType::Post, "_papi_page_type", &value), 1);
        assert_eq!(b.count_where(MetaType::Term, "_papi_page_type", &value), 1);
    }

    #[test]
    fn test_term_meta_support() {
        assert!(InMemoryBackend::new().supports(MetaType::Term));
        let b = InMemoryBackend::without_term_meta();
        assert!(!b.supports(MetaType::Term));
        assert!(b.supports(MetaType::Post));
    }
}
