//! Built-in property types.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Number, Value};
use tracing::debug;

use super::PropertyType;
use crate::codec;
use crate::render::{PropertyRenderer, Widget};
use crate::store::MetaStore;
use crate::types::{is_truthy, Property};

static HTML_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<[^>]*>").ok());

fn strip_tags(text: &str) -> String {
    match HTML_TAG.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

fn settings(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Single-line and multi-line text inputs. Tags are stripped from stored
/// strings unless `allow_html` is set.
#[derive(Debug, Clone, Copy)]
pub struct TextLike {
    name: &'static str,
    input: &'static str,
}

impl TextLike {
    /// A single-line input; the widget kind follows the type name
    /// (`string` renders as `text`).
    pub fn input(name: &'static str) -> Self {
        let input = match name {
            "string" => "text",
            other => other,
        };
        Self { name, input }
    }

    /// The multi-line `text` type.
    pub fn text() -> Self {
        Self {
            name: "text",
            input: "textarea",
        }
    }
}

impl PropertyType for TextLike {
    fn type_name(&self) -> &'static str {
        self.name
    }

    fn default_settings(&self) -> Map<String, Value> {
        settings(json!({ "allow_html": false }))
    }

    fn shape_value(&self, property: &Property, value: Value) -> Value {
        let allow_html = property.setting("allow_html").map(is_truthy).unwrap_or(false);
        match value {
            Value::String(text) if !allow_html => Value::String(strip_tags(&text)),
            other => other,
        }
    }

    fn update_value(&self, property: &Property, value: Value) -> Value {
        match value {
            Value::String(text) if matches!(self.name, "url" | "email") => {
                self.shape_value(property, Value::String(text.trim().to_string()))
            }
            other => self.shape_value(property, other),
        }
    }

    fn render(&self, property: &Property, renderer: &mut dyn PropertyRenderer) {
        renderer.field(property, Widget::for_property(property, self.input));
    }
}

/// Numeric input. Unparseable values read as null.
#[derive(Debug, Clone, Copy)]
pub struct NumberType;

impl PropertyType for NumberType {
    fn type_name(&self) -> &'static str {
        "number"
    }

    fn default_settings(&self) -> Map<String, Value> {
        settings(json!({ "step": 1 }))
    }

    fn shape_value(&self, _property: &Property, value: Value) -> Value {
        match value {
            Value::Number(n) => Value::Number(n),
            Value::String(text) => {
                let text = text.trim();
                if let Ok(i) = text.parse::<i64>() {
                    Value::from(i)
                } else {
                    text.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            _ => Value::Null,
        }
    }

    fn update_value(&self, property: &Property, value: Value) -> Value {
        self.shape_value(property, value)
    }
}

/// On/off switch.
#[derive(Debug, Clone, Copy)]
pub struct BoolType;

impl PropertyType for BoolType {
    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn shape_value(&self, _property: &Property, value: Value) -> Value {
        Value::Bool(is_truthy(&value))
    }

    fn update_value(&self, _property: &Property, value: Value) -> Value {
        // `false` is stored, never deleted.
        Value::Bool(is_truthy(&value))
    }

    fn render(&self, property: &Property, renderer: &mut dyn PropertyRenderer) {
        renderer.field(property, Widget::for_property(property, "checkbox"));
    }
}

/// Select one of `items`.
#[derive(Debug, Clone, Copy)]
pub struct DropdownType;

impl PropertyType for DropdownType {
    fn type_name(&self) -> &'static str {
        "dropdown"
    }

    fn default_settings(&self) -> Map<String, Value> {
        settings(json!({ "items": [], "placeholder": "", "selected": "" }))
    }

    fn render(&self, property: &Property, renderer: &mut dyn PropertyRenderer) {
        let items = property.setting("items").cloned().unwrap_or(json!([]));
        renderer.field(
            property,
            Widget::for_property(property, "select").with_attribute("items", items),
        );
    }
}

/// Select any of `items`. Values are always lists.
#[derive(Debug, Clone, Copy)]
pub struct CheckboxType;

impl PropertyType for CheckboxType {
    fn type_name(&self) -> &'static str {
        "checkbox"
    }

    fn default_settings(&self) -> Map<String, Value> {
        settings(json!({ "items": [], "selected": [] }))
    }

    fn shape_value(&self, _property: &Property, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items),
            Value::Null => Value::Array(Vec::new()),
            scalar => Value::Array(vec![scalar]),
        }
    }

    fn render(&self, property: &Property, renderer: &mut dyn PropertyRenderer) {
        let items = property.setting("items").cloned().unwrap_or(json!([]));
        renderer.field(
            property,
            Widget::for_property(property, "checkbox").with_attribute("items", items),
        );
    }
}

/// Ordered rows of child values, declared under `items`.
///
/// Rows are spread over flat keys by the key codec. Each row also records
/// the type of every declared child so rows can be read back without the
/// declaration.
#[derive(Debug, Clone, Copy)]
pub struct RepeaterType;

impl RepeaterType {
    fn child_types(property: &Property) -> Vec<(String, String)> {
        property
            .children()
            .iter()
            .filter_map(|child| {
                let slug = child.get("slug")?.as_str()?;
                let type_ = child.get("type")?.as_str()?;
                Some((slug.to_string(), type_.to_string()))
            })
            .collect()
    }

    /// The `limit` setting when positive.
    fn limit(property: &Property) -> Option<usize> {
        property
            .setting("limit")
            .and_then(Value::as_i64)
            .filter(|limit| *limit > 0)
            .and_then(|limit| usize::try_from(limit).ok())
    }
}

impl PropertyType for RepeaterType {
    fn type_name(&self) -> &'static str {
        "repeater"
    }

    fn default_settings(&self) -> Map<String, Value> {
        settings(json!({ "items": [], "add_new_label": "Add new row", "limit": -1 }))
    }

    fn read_value(&self, property: &Property, store: &dyn MetaStore) -> Value {
        let slug = property.slug.as_str();
        let Some(stored) = store.get(slug) else {
            return Value::Null;
        };
        let Some(mut count) = codec::repeater_count(&stored) else {
            debug!(slug, count = %stored, "unusable repeater count");
            return Value::Array(Vec::new());
        };
        if let Some(limit) = Self::limit(property) {
            count = count.min(limit);
        }

        let mut flat = Map::new();
        flat.insert(slug.to_string(), Value::from(count));

        let child_types = Self::child_types(property);
        if child_types.is_empty() {
            let prefix = format!("{slug}_");
            let hidden_prefix = codec::hidden(&prefix);
            for key in store.keys() {
                if key.starts_with(&prefix) || key.starts_with(&hidden_prefix) {
                    if let Some(value) = store.get(&key) {
                        flat.insert(key, value);
                    }
                }
            }
        } else {
            // Declared children only: a sibling slug such as `slides_1`
            // shares the `slides_` prefix.
            for index in 0..count {
                for (child, _) in &child_types {
                    let type_key = codec::property_type_key(child, false);
                    for key in [
                        codec::repeater_item_key(slug, index, child),
                        codec::repeater_item_key(slug, index, &type_key),
                    ] {
                        if let Some(value) = store.get(&key) {
                            flat.insert(key, value);
                        }
                    }
                }
            }
        }

        Value::Array(
            codec::unflatten_repeater_values(&flat, slug)
                .into_iter()
                .map(Value::Object)
                .collect(),
        )
    }

    fn shape_value(&self, _property: &Property, value: Value) -> Value {
        let Value::Array(rows) = value else {
            return Value::Array(Vec::new());
        };
        Value::Array(
            rows.into_iter()
                .filter_map(|row| match row {
                    Value::Object(mut row) => {
                        row.retain(|key, _| !codec::is_property_type_key(key));
                        Some(Value::Object(row))
                    }
                    _ => None,
                })
                .collect(),
        )
    }

    fn update_value(&self, property: &Property, value: Value) -> Value {
        let Value::Array(rows) = value else {
            return Value::Null;
        };
        let child_types = Self::child_types(property);
        let limit = Self::limit(property).unwrap_or(usize::MAX);
        let rows: Vec<Map<String, Value>> = rows
            .into_iter()
            .take(limit)
            .filter_map(|row| match row {
                Value::Object(mut row) => {
                    for (slug, type_) in &child_types {
                        row.insert(
                            codec::property_type_key(slug, false),
                            Value::String(type_.clone()),
                        );
                    }
                    Some(row)
                }
                _ => None,
            })
            .collect();

        if rows.is_empty() {
            return Value::Array(Vec::new());
        }
        Value::Object(codec::flatten_repeater_values(&rows, &property.slug))
    }

    fn render(&self, property: &Property, renderer: &mut dyn PropertyRenderer) {
        renderer.begin_group(property);
        let name = codec::with_namespace(&property.slug);
        let rows: &[Value] = match &property.value {
            Value::Array(rows) => rows.as_slice(),
            _ => &[],
        };
        for (index, row) in rows.iter().enumerate() {
            for (slug, type_) in Self::child_types(property) {
                let widget = Widget {
                    input: type_,
                    name: format!("{name}[{index}][{slug}]"),
                    value: row.get(&slug).cloned().unwrap_or(Value::Null),
                    attributes: Map::new(),
                };
                renderer.field(property, widget);
            }
        }
        renderer.end_group(property);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::CollectingRenderer;
    use crate::store::{InMemoryBackend, MetaBackend, PostStore};
    use std::sync::Arc;

    fn property(value: Value) -> Property {
        serde_json::from_value(value).unwrap()
    }

    fn repeater() -> Property {
        property(json!({
            "type": "repeater",
            "slug": "slides",
            "options": {"items": [
                {"type": "string", "slug": "title"},
                {"type": "bool", "slug": "active"},
            ]},
        }))
    }

    #[test]
    fn test_text_strips_tags_unless_allowed() {
        let plain = property(json!({"type": "string", "slug": "a"}));
        assert_eq!(
            TextLike::input("string").shape_value(&plain, json!("<b>hi</b>")),
            json!("hi")
        );

        let html = property(json!({"type": "text", "slug": "a", "options": {"allow_html": true}}));
        assert_eq!(
            TextLike::text().shape_value(&html, json!("<b>hi</b>")),
            json!("<b>hi</b>")
        );
    }

    #[test]
    fn test_url_is_trimmed_on_update() {
        let p = property(json!({"type": "url", "slug": "link"}));
        assert_eq!(
            TextLike::input("url").update_value(&p, json!("  https://example.org ")),
            json!("https://example.org")
        );
    }

    #[test]
    fn test_number_shapes() {
        let p = property(json!({"type": "number", "slug": "n"}));
        assert_eq!(NumberType.shape_value(&p, json!("42")), json!(42));
        assert_eq!(NumberType.shape_value(&p, json!("1.5")), json!(1.5));
        assert_eq!(NumberType.shape_value(&p, json!(7)), json!(7));
        assert_eq!(NumberType.shape_value(&p, json!("seven")), Value::Null);
    }

    #[test]
    fn test_bool_and_checkbox_shapes() {
        let p = property(json!({"type": "bool", "slug": "b"}));
        assert_eq!(BoolType.shape_value(&p, json!("1")), json!(true));
        assert_eq!(BoolType.shape_value(&p, json!("")), json!(false));
        assert_eq!(CheckboxType.shape_value(&p, json!("red")), json!(["red"]));
        assert_eq!(CheckboxType.shape_value(&p, Value::Null), json!([]));
    }

    #[test]
    fn test_repeater_update_adds_child_type_keys() {
        let flat = RepeaterType.update_value(&repeater(), json!([{"title": "a"}]));
        assert_eq!(
            flat,
            json!({
                "slides": 1,
                "slides_0_title": "a",
                "_slides_0_title_property": "string",
                "_slides_0_active_property": "bool",
            })
        );
        assert_eq!(RepeaterType.update_value(&repeater(), json!([])), json!([]));
        assert_eq!(RepeaterType.update_value(&repeater(), json!("x")), Value::Null);
    }

    #[test]
    fn test_repeater_reads_rows_from_store() {
        let backend: Arc<dyn MetaBackend> = Arc::new(InMemoryBackend::new());
        let store = PostStore::new(backend, 1);
        let p = repeater();
        if let Value::Object(flat) =
            RepeaterType.update_value(&p, json!([{"title": "a"}, {"title": "b", "active": true}]))
        {
            for (key, value) in flat {
                store.set(&key, value);
            }
        }
        store.set("slides_other", json!("not a row"));

        let raw = RepeaterType.read_value(&p, &store);
        let rows = RepeaterType.shape_value(&p, raw);
        assert_eq!(rows, json!([{"title": "a"}, {"title": "b", "active": true}]));
    }

    fn save(store: &PostStore, p: &Property, rows: Value) {
        if let Value::Object(flat) = RepeaterType.update_value(p, rows) {
            for (key, value) in flat {
                store.set(&key, value);
            }
        }
    }

    fn read(store: &PostStore, p: &Property) -> Value {
        let raw = RepeaterType.read_value(p, store);
        RepeaterType.shape_value(p, raw)
    }

    #[test]
    fn test_sibling_repeaters_keep_their_rows() {
        let backend: Arc<dyn MetaBackend> = Arc::new(InMemoryBackend::new());
        let store = PostStore::new(backend, 1);
        let s = property(json!({
            "type": "repeater",
            "slug": "s",
            "options": {"items": [{"type": "string", "slug": "a"}]},
        }));
        let s_1 = property(json!({
            "type": "repeater",
            "slug": "s_1",
            "options": {"items": [{"type": "string", "slug": "b"}]},
        }));
        save(&store, &s, json!([{"a": "x"}, {"a": "y"}]));
        save(&store, &s_1, json!([{"b": "z"}]));
        store.set("_s_1_property", json!("repeater"));

        assert_eq!(read(&store, &s), json!([{"a": "x"}, {"a": "y"}]));
        assert_eq!(read(&store, &s_1), json!([{"b": "z"}]));
    }

    #[test]
    fn test_repeater_limit_caps_rows() {
        let backend: Arc<dyn MetaBackend> = Arc::new(InMemoryBackend::new());
        let store = PostStore::new(backend, 1);
        let mut p = repeater();
        save(&store, &p, json!([{"title": "a"}, {"title": "b"}, {"title": "c"}]));
        p.options.insert("limit".to_string(), json!(2));

        assert_eq!(read(&store, &p), json!([{"title": "a"}, {"title": "b"}]));
        let flat =
            RepeaterType.update_value(&p, json!([{"title": "a"}, {"title": "b"}, {"title": "c"}]));
        assert_eq!(flat["slides"], json!(2));
        assert!(flat.get("slides_2_title").is_none());
    }

    #[test]
    fn test_repeater_oversized_count_reads_empty() {
        let backend: Arc<dyn MetaBackend> = Arc::new(InMemoryBackend::new());
        let store = PostStore::new(backend, 1);
        store.set("slides", json!(u64::MAX));
        store.set("slides_0_title", json!("a"));
        assert_eq!(read(&store, &repeater()), json!([]));

        store.set("slides", json!(1e12));
        assert_eq!(read(&store, &repeater()), json!([]));
    }

    #[test]
    fn test_repeater_without_count_reads_null() {
        let backend: Arc<dyn MetaBackend> = Arc::new(InMemoryBackend::new());
        let store = PostStore::new(backend, 1);
        assert_eq!(RepeaterType.read_value(&repeater(), &store), Value::Null);
        assert_eq!(RepeaterType.shape_value(&repeater(), Value::Null), json!([]));
    }

    #[test]
    fn test_repeater_renders_one_widget_per_child_and_row() {
        let mut p = repeater();
        p.value = json!([{"title": "a"}, {"title": "b"}]);
        let mut out = CollectingRenderer::new();
        RepeaterType.render(&p, &mut out);
        assert_eq!(out.groups, vec!["slides".to_string()]);
        assert_eq!(
            out.names(),
            vec![
                "papi_slides[0][title]",
                "papi_slides[0][active]",
                "papi_slides[1][title]",
                "papi_slides[1][active]",
            ]
        );
    }
}
