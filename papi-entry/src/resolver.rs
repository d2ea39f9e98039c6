//! Which entry type governs a post, a term or an option page.
//!
//! Resolution for one lookup:
//!
//! 1. An id of `0` is taken from the request (`post`/`page_id`, `term_id`).
//! 2. Posts read their stored pointer.
//! 3. Still empty: the request's `entry_type` parameter, then for option
//!    pages the `page` parameter without its `papi/` prefix.
//! 4. The id runs through [`ENTRY_TYPE_ID_HOOK`]; the built-in filters read
//!    term pointers and container defaults.

use papi_fields::{MetaBackend, MetaType, RequestContext};
use serde_json::Value;
use tracing::debug;

use crate::container::Container;
use crate::filters::{FilterChain, FilterContext, ENTRY_TYPE_ID_HOOK};
use crate::registry::EntryTypeRegistry;
use crate::types::{EntryType, EntryTypeKind};

/// An entry type given by id or by value.
#[derive(Debug, Clone, Copy)]
pub enum EntryTypeRef<'a> {
    Id(&'a str),
    EntryType(&'a EntryType),
}

impl<'a> From<&'a str> for EntryTypeRef<'a> {
    fn from(id: &'a str) -> Self {
        EntryTypeRef::Id(id)
    }
}

impl<'a> From<&'a String> for EntryTypeRef<'a> {
    fn from(id: &'a String) -> Self {
        EntryTypeRef::Id(id.as_str())
    }
}

impl<'a> From<&'a EntryType> for EntryTypeRef<'a> {
    fn from(entry_type: &'a EntryType) -> Self {
        EntryTypeRef::EntryType(entry_type)
    }
}

/// Resolves entry type ids against one registry and backend.
pub struct EntryTypeResolver<'a> {
    registry: &'a EntryTypeRegistry,
    backend: &'a dyn MetaBackend,
    container: &'a Container,
    filters: &'a FilterChain,
    page_type_key: &'a str,
}

impl<'a> EntryTypeResolver<'a> {
    pub fn new(
        registry: &'a EntryTypeRegistry,
        backend: &'a dyn MetaBackend,
        container: &'a Container,
        filters: &'a FilterChain,
        page_type_key: &'a str,
    ) -> Self {
        Self {
            registry,
            backend,
            container,
            filters,
            page_type_key,
        }
    }

    /// The entry type id of `id` in `meta_type`, or an empty string.
    pub fn entry_type_id(&self, id: u64, meta_type: MetaType, request: &RequestContext) -> String {
        let meta_id = if id == 0 {
            request.meta_id(meta_type).unwrap_or(0)
        } else {
            id
        };

        let mut entry_type_id = String::new();

        if meta_type == MetaType::Post && meta_id > 0 {
            if let Some(Value::String(stored)) = self.backend.get(MetaType::Post, meta_id, self.page_type_key) {
                entry_type_id = stored;
            }
        }

        if entry_type_id.is_empty() {
            if let Some(requested) = request.entry_type() {
                entry_type_id = requested.to_string();
            }
        }

        if entry_type_id.is_empty() && (meta_type == MetaType::Option || request.is_option_page()) {
            if let Some(page) = request.query("page") {
                entry_type_id = page.strip_prefix("papi/").unwrap_or(page).to_string();
            }
        }

        let ctx = FilterContext {
            meta_type,
            meta_id,
            backend: self.backend,
            container: self.container,
            page_type_key: self.page_type_key,
            request,
        };
        let resolved = self.filters.apply(ENTRY_TYPE_ID_HOOK, entry_type_id, &ctx);
        debug!(meta_type = %meta_type, meta_id, entry_type_id = %resolved, "entry type id resolved");
        resolved
    }

    /// The entry type governing `id` in `meta_type`.
    pub fn entry_type_by_meta_id(
        &self,
        id: u64,
        meta_type: MetaType,
        request: &RequestContext,
    ) -> Option<EntryType> {
        let entry_type_id = self.entry_type_id(id, meta_type, request);
        self.registry.by_id(&entry_type_id)
    }

    /// Number of entries whose stored pointer names the entry type.
    ///
    /// Option types are never pointed at and count `0`; ids not found in the
    /// registry are counted among posts.
    pub fn entry_type_count<'r>(&self, entry_type: impl Into<EntryTypeRef<'r>>) -> usize {
        let (id, kind) = match entry_type.into() {
            EntryTypeRef::Id(id) => {
                let id = id.trim();
                let kind = self.registry.by_id(id).map(|t| t.kind);
                (id.to_string(), kind)
            }
            EntryTypeRef::EntryType(entry_type) => (entry_type.id.clone(), Some(entry_type.kind)),
        };

        if id.is_empty() {
            return 0;
        }

        let meta_type = match kind {
            Some(EntryTypeKind::Option) => return 0,
            Some(kind) => kind.meta_type(),
            None => MetaType::Post,
        };
        self.backend
            .count_where(meta_type, self.page_type_key, &Value::String(id))
    }

    /// Template of the entry type governing `id` in `meta_type`.
    pub fn entry_type_template(
        &self,
        id: u64,
        meta_type: MetaType,
        request: &RequestContext,
    ) -> Option<String> {
        self.entry_type_by_meta_id(id, meta_type, request)
            .map(|entry_type| entry_type.template)
            .filter(|template| !template.is_empty())
    }

    /// The entry type id of a term.
    pub fn taxonomy_type_id(&self, term_id: u64, request: &RequestContext) -> String {
        self.entry_type_id(term_id, MetaType::Term, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::taxonomy_key;
    use papi_fields::InMemoryBackend;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const KEY: &str = "_papi_page_type";

    struct Fixture {
        _dir: TempDir,
        registry: EntryTypeRegistry,
        backend: InMemoryBackend,
        container: Container,
        filters: FilterChain,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(
                dir.path().join("simple-page-type.yaml"),
                "type: page\nname: Simple\ntemplate: pages/simple-page.php\n",
            )
            .unwrap();
            fs::write(
                dir.path().join("simple-taxonomy-type.yaml"),
                "type: taxonomy\nname: Simple taxonomy\ntemplate: pages/simple-taxonomy.php\n",
            )
            .unwrap();
            fs::write(dir.path().join("header.yaml"), "type: option\nname: Header\n").unwrap();
            Self {
                registry: EntryTypeRegistry::new(vec![dir.path().to_path_buf()]),
                _dir: dir,
                backend: InMemoryBackend::new(),
                container: Container::new(),
                filters: FilterChain::with_defaults(),
            }
        }

        fn resolver(&self) -> EntryTypeResolver<'_> {
            EntryTypeResolver::new(&self.registry, &self.backend, &self.container, &self.filters, KEY)
        }
    }

    #[test]
    fn test_post_pointer() {
        let f = Fixture::new();
        let request = RequestContext::new();
        assert_eq!(f.resolver().entry_type_id(1, MetaType::Post, &request), "");

        f.backend.set(MetaType::Post, 1, KEY, json!("simple-page-type"));
        assert_eq!(
            f.resolver().entry_type_id(1, MetaType::Post, &request),
            "simple-page-type"
        );
        assert_eq!(
            f.resolver()
                .entry_type_by_meta_id(1, MetaType::Post, &request)
                .unwrap()
                .name,
            "Simple"
        );
    }

    #[test]
    fn test_id_from_request() {
        let f = Fixture::new();
        f.backend.set(MetaType::Post, 7, KEY, json!("simple-page-type"));

        let request = RequestContext::new().with_query("page_id", "7");
        assert!(f.resolver().entry_type_by_meta_id(0, MetaType::Post, &request).is_some());

        let request = RequestContext::new().with_query("entry_type", "simple-page-type");
        assert_eq!(
            f.resolver().entry_type_id(0, MetaType::Post, &request),
            "simple-page-type"
        );

        assert!(f
            .resolver()
            .entry_type_by_meta_id(0, MetaType::Post, &RequestContext::new())
            .is_none());
    }

    #[test]
    fn test_option_page() {
        let f = Fixture::new();
        let request = RequestContext::new().with_query("page", "papi/header");
        assert_eq!(f.resolver().entry_type_id(0, MetaType::Option, &request), "header");
        assert_eq!(
            f.resolver()
                .entry_type_by_meta_id(0, MetaType::Option, &request)
                .unwrap()
                .kind,
            EntryTypeKind::Option
        );
    }

    #[test]
    fn test_term_pointer_and_container_default() {
        let mut f = Fixture::new();
        let request = RequestContext::new();
        f.backend.set(MetaType::Term, 3, KEY, json!("simple-taxonomy-type"));
        assert_eq!(f.resolver().taxonomy_type_id(3, &request), "simple-taxonomy-type");

        f.backend.set_subtype(MetaType::Term, 4, "category");
        assert_eq!(f.resolver().taxonomy_type_id(4, &request), "");

        f.container.bind(taxonomy_key("category"), "simple-taxonomy-type");
        assert_eq!(f.resolver().taxonomy_type_id(4, &request), "simple-taxonomy-type");
    }

    #[test]
    fn test_template() {
        let f = Fixture::new();
        let request = RequestContext::new();
        assert_eq!(f.resolver().entry_type_template(0, MetaType::Post, &request), None);

        f.backend.set(MetaType::Post, 1, KEY, json!("simple-page-type"));
        f.backend.set(MetaType::Term, 2, KEY, json!("simple-taxonomy-type"));
        assert_eq!(
            f.resolver().entry_type_template(1, MetaType::Post, &request).as_deref(),
            Some("pages/simple-page.php")
        );
        assert_eq!(
            f.resolver().entry_type_template(2, MetaType::Term, &request).as_deref(),
            Some("pages/simple-taxonomy.php")
        );
    }

    #[test]
    fn test_count() {
        let f = Fixture::new();
        assert_eq!(f.resolver().entry_type_count("simple-page-type"), 0);
        assert_eq!(f.resolver().entry_type_count(""), 0);

        f.backend.set(MetaType::Post, 1, KEY, json!("simple-page-type"));
        assert_eq!(f.resolver().entry_type_count("simple-page-type"), 1);

        let entry_type = f.registry.by_id("simple-page-type").unwrap();
        assert_eq!(f.resolver().entry_type_count(&entry_type), 1);

        f.backend.set(MetaType::Post, 1, KEY, json!("other"));
        assert_eq!(f.resolver().entry_type_count(&entry_type), 0);

        let header = f.registry.by_id("header").unwrap();
        assert_eq!(f.resolver().entry_type_count(&header), 0);
    }
}
