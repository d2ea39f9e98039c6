//! Core property types.
//!
//! A [`Property`] is one declared field with its resolved options and current
//! value. Declarations arrive as loose option maps (from YAML definitions or
//! code) and are held as [`PropertyEntry::Raw`] until materialized.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

fn default_true() -> bool {
    true
}

/// `lang` is either `false` (any language) or a language code.
mod lang_option {
    use super::*;

    pub fn serialize<S: Serializer>(lang: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match lang {
            Some(code) => s.serialize_str(code),
            None => s.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(code) if !code.is_empty() => Some(code.to_lowercase()),
            _ => None,
        })
    }
}

/// Accept a single capability string as well as a list.
fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if s.is_empty() => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

/// A materialized property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    /// Type-specific settings, merged over the handler defaults.
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, deserialize_with = "one_or_many")]
    pub capabilities: Vec<String>,
    #[serde(default, with = "lang_option")]
    pub lang: Option<String>,
    /// Skip value shaping when reading.
    #[serde(default)]
    pub raw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(default = "default_true")]
    pub sidebar: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(
        rename = "_box_property",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub box_property: bool,
}

impl Property {
    /// A type-specific setting.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Child declarations of a composite property (`options.items`).
    pub fn children(&self) -> Vec<Map<String, Value>> {
        match self.options.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One element of a property list: a materialized property or a raw
/// declaration (including tab markers).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEntry {
    Property(Box<Property>),
    Raw(Map<String, Value>),
}

impl PropertyEntry {
    /// Whether this entry is a tab marker.
    pub fn is_tab(&self) -> bool {
        match self {
            PropertyEntry::Property(_) => false,
            PropertyEntry::Raw(map) => map.get("tab").map(is_truthy).unwrap_or(false),
        }
    }

    pub fn as_property(&self) -> Option<&Property> {
        match self {
            PropertyEntry::Property(p) => Some(p),
            PropertyEntry::Raw(_) => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            PropertyEntry::Property(p) => Some(p.title.as_str()),
            PropertyEntry::Raw(map) => map.get("title").and_then(Value::as_str),
        }
    }

    /// Declared order, or `default` when none is declared.
    pub fn sort_order(&self, default: i64) -> i64 {
        match self {
            PropertyEntry::Property(p) => p.sort_order,
            PropertyEntry::Raw(map) => map.get("sort_order").and_then(Value::as_i64),
        }
        .unwrap_or(default)
    }

    /// Properties declared inside a tab marker.
    pub fn tab_properties(&self) -> Vec<Map<String, Value>> {
        match self {
            PropertyEntry::Raw(map) if self.is_tab() => match map.get("properties") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect(),
                Some(Value::Object(single)) => vec![single.clone()],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

impl From<Property> for PropertyEntry {
    fn from(property: Property) -> Self {
        PropertyEntry::Property(Box::new(property))
    }
}

/// Property declarations as handed to a box.
#[derive(Debug, Clone, PartialEq)]
pub enum Declarations {
    /// A lone materialized property.
    Single(Box<Property>),
    /// A bare options map for one property, without a list around it.
    Implicit(Map<String, Value>),
    /// An ordered list of entries.
    List(Vec<PropertyEntry>),
}

impl Declarations {
    /// Interpret a loose JSON value: lists become [`Declarations::List`],
    /// maps become [`Declarations::Implicit`], anything else is empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Declarations::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(PropertyEntry::Raw(map)),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Object(map) => Declarations::Implicit(map),
            _ => Declarations::List(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Declarations::Single(_) => false,
            Declarations::Implicit(map) => map.is_empty(),
            Declarations::List(entries) => entries.is_empty(),
        }
    }
}

impl Default for Declarations {
    fn default() -> Self {
        Declarations::List(Vec::new())
    }
}

/// A value on its way to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaEnvelope {
    pub type_: String,
    pub slug: String,
    pub value: Value,
    pub post_id: u64,
}

/// Loose truthiness for flags read from untyped declarations.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0" && s != "false",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

/// Whether a value counts as empty for storage: null, empty string, empty
/// list or empty map. `false` and `0` are values.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_from_minimal_map() {
        let p: Property = serde_json::from_value(json!({"type": "string", "slug": "name"})).unwrap();
        assert_eq!(p.type_, "string");
        assert_eq!(p.slug, "name");
        assert!(p.sidebar);
        assert_eq!(p.lang, None);
        assert_eq!(p.value, Value::Null);
    }

    #[test]
    fn property_lang_and_capabilities() {
        let p: Property = serde_json::from_value(json!({
            "type": "string",
            "lang": "SV",
            "capabilities": "manage_options",
        }))
        .unwrap();
        assert_eq!(p.lang.as_deref(), Some("sv"));
        assert_eq!(p.capabilities, vec!["manage_options".to_string()]);

        let out = serde_json::to_value(Property { lang: None, ..p }).unwrap();
        assert_eq!(out["lang"], json!(false));
    }

    #[test]
    fn box_property_flag_uses_underscore_key() {
        let p: Property =
            serde_json::from_value(json!({"type": "string", "_box_property": true})).unwrap();
        assert!(p.box_property);
        let out = serde_json::to_value(&p).unwrap();
        assert_eq!(out["_box_property"], json!(true));
    }

    #[test]
    fn declarations_from_value() {
        match Declarations::from_value(json!([{"type": "string"}, 3, {"tab": true}])) {
            Declarations::List(entries) => {
                assert_eq!(entries.len(), 2);
                assert!(entries[1].is_tab());
            }
            other => panic!("expected list, got {other:?}"),
        }
        assert!(matches!(
            Declarations::from_value(json!({"type": "string"})),
            Declarations::Implicit(_)
        ));
        assert!(Declarations::from_value(json!("title")).is_empty());
    }

    #[test]
    fn tab_properties_read_nested_list() {
        let entry = PropertyEntry::Raw(
            json!({"tab": true, "title": "Tab", "properties": [{"type": "string"}]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(entry.tab_properties().len(), 1);
        assert_eq!(entry.title(), Some("Tab"));
    }

    #[test]
    fn emptiness_rules() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!("0")));
    }
}
