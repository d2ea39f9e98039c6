//! Request-scoped state supplied by the host.
//!
//! The core never reads globals. Whatever the host knows about the current
//! request (query parameters, the user's capabilities) is passed in here.

use std::collections::{HashMap, HashSet};

use crate::store::MetaType;

/// Query parameters and user capabilities of the current request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    query: HashMap<String, String>,
    capabilities: HashSet<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Grant the current user a capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// A non-empty query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The id of the entry being edited in `meta_type`.
    ///
    /// Posts read `post` then `page_id`; terms read `term_id`; options have
    /// no id.
    pub fn meta_id(&self, meta_type: MetaType) -> Option<u64> {
        let keys: &[&str] = match meta_type {
            MetaType::Post => &["post", "page_id"],
            MetaType::Term => &["term_id"],
            MetaType::Option => return None,
        };
        keys.iter()
            .filter_map(|k| self.query(k))
            .find_map(|v| v.parse().ok())
    }

    /// Entry type id requested explicitly.
    pub fn entry_type(&self) -> Option<&str> {
        self.query("entry_type")
    }

    /// Whether the request is for an option page.
    pub fn is_option_page(&self) -> bool {
        self.query("page")
            .map(|page| page.starts_with("papi/option"))
            .unwrap_or(false)
    }

    /// Requested content language, lowercased.
    pub fn lang(&self) -> Option<String> {
        self.query("lang").map(str::to_lowercase)
    }

    /// Whether the user holds every listed capability.
    pub fn user_can(&self, capabilities: &[String]) -> bool {
        capabilities.iter().all(|c| self.capabilities.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_id() {
        assert_eq!(RequestContext::new().meta_id(MetaType::Option), None);

        let ctx = RequestContext::new().with_query("post", "1");
        assert_eq!(ctx.meta_id(MetaType::Post), Some(1));

        let ctx = RequestContext::new().with_query("page_id", "5");
        assert_eq!(ctx.meta_id(MetaType::Post), Some(5));

        let ctx = RequestContext::new().with_query("term_id", "2");
        assert_eq!(ctx.meta_id(MetaType::Term), Some(2));
        assert_eq!(ctx.meta_id(MetaType::Post), None);
    }

    #[test]
    fn test_is_option_page() {
        assert!(!RequestContext::new().is_option_page());
        let ctx = RequestContext::new().with_query("page", "papi/option/options/header");
        assert!(ctx.is_option_page());
        let ctx = RequestContext::new().with_query("page", "papi/page/simple");
        assert!(!ctx.is_option_page());
    }

    #[test]
    fn test_user_can() {
        let ctx = RequestContext::new().with_capability("edit_posts");
        assert!(ctx.user_can(&[]));
        assert!(ctx.user_can(&["edit_posts".to_string()]));
        assert!(!ctx.user_can(&["edit_posts".to_string(), "manage_options".to_string()]));
    }

    #[test]
    fn test_empty_query_is_absent() {
        let ctx = RequestContext::new().with_query("entry_type", "").with_query("lang", "SV");
        assert_eq!(ctx.entry_type(), None);
        assert_eq!(ctx.lang().as_deref(), Some("sv"));
    }
}
