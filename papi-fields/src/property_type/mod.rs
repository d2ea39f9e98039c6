//! Property types: the pluggable behavior behind each `type:` tag.
//!
//! A [`PropertyType`] supplies default settings, reads and shapes stored
//! values, transforms values before they are persisted, and describes its
//! widget. [`PropertyTypeRegistry`] maps type tags onto handlers by exact
//! match of the short type name.

mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::render::{PropertyRenderer, Widget};
use crate::store::MetaStore;
use crate::types::Property;

pub use builtin::{BoolType, CheckboxType, DropdownType, NumberType, RepeaterType, TextLike};

/// Behavior of one property type.
pub trait PropertyType: Send + Sync {
    /// Short type tag, e.g. `string` or `repeater`.
    fn type_name(&self) -> &'static str;

    /// Type-specific settings merged under user options.
    fn default_settings(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Pull the raw stored value for `property`.
    fn read_value(&self, property: &Property, store: &dyn MetaStore) -> Value {
        store.get(&property.slug).unwrap_or(Value::Null)
    }

    /// Format a value before it is handed out.
    fn shape_value(&self, _property: &Property, value: Value) -> Value {
        value
    }

    /// Transform a value before it is persisted.
    fn update_value(&self, _property: &Property, value: Value) -> Value {
        value
    }

    fn render(&self, property: &Property, renderer: &mut dyn PropertyRenderer) {
        renderer.field(property, Widget::for_property(property, self.type_name()));
    }
}

/// Anything a type can be looked up by.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'a> {
    Name(&'a str),
    Property(&'a Property),
    Value(&'a Value),
}

impl<'a> TypeRef<'a> {
    fn name(self) -> Option<&'a str> {
        match self {
            TypeRef::Name(name) => Some(name),
            TypeRef::Property(p) => Some(p.type_.as_str()),
            TypeRef::Value(Value::String(name)) => Some(name.as_str()),
            TypeRef::Value(Value::Object(map)) => map.get("type").and_then(Value::as_str),
            TypeRef::Value(_) => None,
        }
    }
}

impl<'a> From<&'a str> for TypeRef<'a> {
    fn from(name: &'a str) -> Self {
        TypeRef::Name(name)
    }
}

impl<'a> From<&'a String> for TypeRef<'a> {
    fn from(name: &'a String) -> Self {
        TypeRef::Name(name.as_str())
    }
}

impl<'a> From<&'a Property> for TypeRef<'a> {
    fn from(property: &'a Property) -> Self {
        TypeRef::Property(property)
    }
}

impl<'a> From<&'a Value> for TypeRef<'a> {
    fn from(value: &'a Value) -> Self {
        TypeRef::Value(value)
    }
}

/// Lowercased type tag with any leading `property` marker removed.
pub fn short_type(type_: &str) -> Option<String> {
    let lower = type_.trim().to_lowercase();
    let short = lower.strip_prefix("property").unwrap_or(&lower);
    (!short.is_empty()).then(|| short.to_string())
}

/// Canonical handler name for a type tag, e.g. `PropertyString`.
pub fn class_name_for(type_: &str) -> Option<String> {
    let short = short_type(type_)?;
    let mut chars = short.chars();
    let first = chars.next()?;
    Some(format!("Property{}{}", first.to_uppercase(), chars.as_str()))
}

/// Baseline options every property carries before type settings and user
/// options are merged over them.
pub fn default_options() -> Map<String, Value> {
    let defaults = json!({
        "type": "",
        "slug": "",
        "title": "",
        "options": {},
        "value": null,
        "default_value": null,
        "required": false,
        "disabled": false,
        "capabilities": [],
        "lang": false,
        "raw": false,
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Catalog of property types keyed by short type name.
#[derive(Clone, Default)]
pub struct PropertyTypeRegistry {
    handlers: HashMap<String, Arc<dyn PropertyType>>,
}

impl PropertyTypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for name in ["string", "hidden", "url", "email"] {
            registry.register(TextLike::input(name));
        }
        registry.register(TextLike::text());
        registry.register(NumberType);
        registry.register(BoolType);
        registry.register(DropdownType);
        registry.register(CheckboxType);
        registry.register(RepeaterType);
        registry
    }

    /// Register a handler under its type name, replacing any previous one.
    pub fn register(&mut self, handler: impl PropertyType + 'static) -> &mut Self {
        self.handlers
            .insert(handler.type_name().to_string(), Arc::new(handler));
        self
    }

    /// The handler for a type tag, property or loose value.
    pub fn resolve<'a>(&self, type_ref: impl Into<TypeRef<'a>>) -> Option<Arc<dyn PropertyType>> {
        let short = short_type(type_ref.into().name()?)?;
        self.handlers.get(&short).cloned()
    }

    pub fn contains(&self, type_: &str) -> bool {
        self.resolve(type_).is_some()
    }

    /// Default settings of a type, empty when it is unregistered.
    pub fn default_settings_for(&self, type_: &str) -> Map<String, Value> {
        self.resolve(type_)
            .map(|handler| handler.default_settings())
            .unwrap_or_default()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for PropertyTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyTypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_and_class_name() {
        assert_eq!(short_type("PropertyString").as_deref(), Some("string"));
        assert_eq!(short_type("repeater").as_deref(), Some("repeater"));
        assert_eq!(short_type(""), None);
        assert_eq!(short_type("property"), None);
        assert_eq!(class_name_for("string").as_deref(), Some("PropertyString"));
        assert_eq!(class_name_for("PropertyRepeater").as_deref(), Some("PropertyRepeater"));
        assert_eq!(class_name_for(""), None);
    }

    #[test]
    fn test_resolve_accepts_names_values_and_properties() {
        let registry = PropertyTypeRegistry::with_builtins();
        assert_eq!(registry.resolve("string").unwrap().type_name(), "string");
        assert_eq!(registry.resolve("PropertyText").unwrap().type_name(), "text");

        let value = json!({"type": "repeater"});
        assert_eq!(registry.resolve(&value).unwrap().type_name(), "repeater");

        let property: Property = serde_json::from_value(json!({"type": "bool"})).unwrap();
        assert_eq!(registry.resolve(&property).unwrap().type_name(), "bool");

        assert!(registry.resolve("fake").is_none());
        assert!(registry.resolve("").is_none());
        assert!(registry.resolve(&json!(null)).is_none());
        assert!(registry.resolve(&json!(true)).is_none());
        assert!(registry.resolve(&json!({})).is_none());
    }

    #[test]
    fn test_default_options_key_set() {
        let mut keys: Vec<String> = default_options().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "capabilities", "default_value", "disabled", "lang", "options", "raw",
                "required", "slug", "title", "type", "value",
            ]
        );
        assert_eq!(default_options()["lang"], json!(false));
    }

    #[test]
    fn test_default_settings_for() {
        let registry = PropertyTypeRegistry::with_builtins();
        assert_eq!(registry.default_settings_for("string")["allow_html"], json!(false));
        assert!(registry.default_settings_for("fake").is_empty());
    }

    #[test]
    fn test_register_replaces() {
        struct Custom;
        impl PropertyType for Custom {
            fn type_name(&self) -> &'static str {
                "string"
            }
        }

        let mut registry = PropertyTypeRegistry::with_builtins();
        registry.register(Custom);
        assert!(registry.default_settings_for("string").is_empty());
        assert!(registry.type_names().contains(&"repeater"));
    }
}
