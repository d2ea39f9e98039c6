//! Writing property values into meta storage.
//!
//! Writes are best-effort. A composite value is stored one child key at a
//! time and nothing is rolled back if the process stops halfway.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::request::RequestContext;
use crate::store::{MetaBackend, MetaStore, OptionStore, PostStore};
use crate::types::{is_empty_value, MetaEnvelope};

/// Persist a value, choosing option storage on option pages and the post's
/// meta otherwise.
pub fn persist(envelope: &MetaEnvelope, request: &RequestContext, backend: Arc<dyn MetaBackend>) {
    if request.is_option_page() {
        persist_to(envelope, &OptionStore::new(backend));
    } else {
        persist_to(envelope, &PostStore::new(backend, envelope.post_id));
    }
}

/// Persist a value into an explicit store.
///
/// A map with keys is one composite item whose children are stored under
/// their own keys. A list is stored whole unless its items are maps, in
/// which case each item's children are stored. An empty value deletes the
/// slug. The type key is written last.
pub fn persist_to(envelope: &MetaEnvelope, store: &dyn MetaStore) {
    if envelope.type_.is_empty() {
        return;
    }

    let value = match &envelope.value {
        Value::Object(map) if !map.is_empty() => Value::Array(vec![envelope.value.clone()]),
        other => other.clone(),
    };

    if is_empty_value(&value) {
        debug!(slug = %envelope.slug, "deleting empty value");
        store.delete(&envelope.slug);
        return;
    }

    let items = match &value {
        Value::Array(items) => items.as_slice(),
        scalar => std::slice::from_ref(scalar),
    };

    let mut stored_whole = false;
    for item in items {
        match item {
            Value::Object(children) => {
                for (key, child) in children {
                    store.set(key, child.clone());
                }
            }
            _ if !stored_whole => {
                store.set(&envelope.slug, envelope.value.clone());
                stored_whole = true;
            }
            _ => {}
        }
    }

    store.set(
        &store.type_key(&envelope.slug),
        Value::String(envelope.type_.clone()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryBackend, MetaType};
    use serde_json::json;

    fn envelope(type_: &str, slug: &str, value: Value) -> MetaEnvelope {
        MetaEnvelope {
            type_: type_.to_string(),
            slug: slug.to_string(),
            value,
            post_id: 1,
        }
    }

    fn backend() -> Arc<InMemoryBackend> {
        Arc::new(InMemoryBackend::new())
    }

    #[test]
    fn test_scalar_value_and_type_key() {
        let b = backend();
        persist(&envelope("string", "name", json!("Fredrik")), &RequestContext::new(), b.clone());
        assert_eq!(b.get(MetaType::Post, 1, "name"), Some(json!("Fredrik")));
        assert_eq!(b.get(MetaType::Post, 1, "_name_property"), Some(json!("string")));
    }

    #[test]
    fn test_empty_type_is_ignored() {
        let b = backend();
        persist(&envelope("", "name", json!("x")), &RequestContext::new(), b.clone());
        assert!(b.is_empty());
    }

    #[test]
    fn test_empty_value_deletes() {
        let b = backend();
        b.set(MetaType::Post, 1, "name", json!("old"));
        for empty in [Value::Null, json!(""), json!([]), json!({})] {
            persist(&envelope("string", "name", empty), &RequestContext::new(), b.clone());
            assert_eq!(b.get(MetaType::Post, 1, "name"), None);
        }
        assert_eq!(b.get(MetaType::Post, 1, "_name_property"), None);
    }

    #[test]
    fn test_list_of_scalars_is_stored_whole() {
        let b = backend();
        persist(&envelope("checkbox", "colors", json!(["red", "blue"])), &RequestContext::new(), b.clone());
        assert_eq!(b.get(MetaType::Post, 1, "colors"), Some(json!(["red", "blue"])));
    }

    #[test]
    fn test_map_children_are_stored_individually() {
        let b = backend();
        let value = json!({"slides": 1, "slides_0_title": "a", "_slides_0_title_property": "string"});
        persist(&envelope("repeater", "slides", value), &RequestContext::new(), b.clone());
        assert_eq!(b.get(MetaType::Post, 1, "slides"), Some(json!(1)));
        assert_eq!(b.get(MetaType::Post, 1, "slides_0_title"), Some(json!("a")));
        assert_eq!(
            b.get(MetaType::Post, 1, "_slides_0_title_property"),
            Some(json!("string"))
        );
        assert_eq!(b.get(MetaType::Post, 1, "_slides_property"), Some(json!("repeater")));
    }

    #[test]
    fn test_option_page_writes_namespaced_options() {
        let b = backend();
        let request = RequestContext::new().with_query("page", "papi/option/options/header");
        persist(&envelope("string", "name", json!("site")), &request, b.clone());
        assert_eq!(b.get(MetaType::Option, 0, "papi_name"), Some(json!("site")));
        assert_eq!(
            b.get(MetaType::Option, 0, "_papi_name_property"),
            Some(json!("string"))
        );
        assert_eq!(b.get(MetaType::Post, 1, "name"), None);
    }
}
