//! Property value model: turning declarations into properties with values.
//!
//! [`PropertyContext`] ties a [`PropertyTypeRegistry`] to an optional
//! [`MetaStore`]. It builds box declarations from their sources, normalizes
//! and materializes them into [`Property`] values, and writes values back.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{FieldsError, Result};
use crate::persist::persist_to;
use crate::property_type::{default_options, PropertyTypeRegistry};
use crate::store::MetaStore;
use crate::types::{is_empty_value, is_truthy, Declarations, MetaEnvelope, Property, PropertyEntry};

/// Fallback order for properties that declare none.
pub const DEFAULT_SORT_ORDER: i64 = 1000;

/// Where a box's declarations come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySource {
    /// Declarations given directly; the title is looked up among them.
    Inline(Declarations),
    /// A fragment file rendered with `values` before parsing.
    Definition {
        path: PathBuf,
        values: Map<String, Value>,
    },
    /// A title with its declarations.
    Title {
        title: String,
        properties: Declarations,
    },
}

impl PropertySource {
    /// Resolve an untyped box input.
    ///
    /// A string naming a `.yaml`/`.yml` file is a definition reference and
    /// `extra` holds its template values. Any other string is a title and
    /// `extra` holds its declarations. Lists and maps are inline.
    pub fn from_value(input: Value, extra: Value) -> Self {
        match input {
            Value::String(s) if is_definition_path(&s) => PropertySource::Definition {
                path: PathBuf::from(s),
                values: match extra {
                    Value::Object(values) => values,
                    _ => Map::new(),
                },
            },
            Value::String(title) => PropertySource::Title {
                title,
                properties: Declarations::from_value(extra),
            },
            other => PropertySource::Inline(Declarations::from_value(other)),
        }
    }
}

fn is_definition_path(s: &str) -> bool {
    matches!(
        Path::new(s).extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Derive a slug from a title: lowercase, runs of other characters become `_`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// Read a fragment file, render it with `values` and split it into
/// options (string keys) and property declarations.
///
/// Declarations are integer keys, a top-level sequence, or a `properties`
/// list.
pub fn load_fragment(path: &Path, values: &Map<String, Value>) -> Result<(Map<String, Value>, Vec<Value>)> {
    let text = papi_directory::read_definition(path)?;

    let parser = liquid::ParserBuilder::with_stdlib()
        .build()
        .map_err(|e| FieldsError::template(path, e))?;
    let globals = liquid::to_object(values).map_err(|e| FieldsError::template(path, e))?;
    let rendered = parser
        .parse(&text)
        .and_then(|template| template.render(&globals))
        .map_err(|e| FieldsError::template(path, e))?;

    let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_str(&rendered)?;
    let mut options = Map::new();
    let mut properties = Vec::new();

    match yaml {
        serde_yaml_ng::Value::Sequence(items) => {
            for item in items {
                properties.push(serde_json::to_value(item)?);
            }
        }
        serde_yaml_ng::Value::Mapping(mapping) => {
            for (key, value) in mapping {
                match key {
                    serde_yaml_ng::Value::Number(_) => properties.push(serde_json::to_value(value)?),
                    serde_yaml_ng::Value::String(key) if key == "properties" => {
                        match serde_json::to_value(value)? {
                            Value::Array(items) => properties.extend(items),
                            single @ Value::Object(_) => properties.push(single),
                            _ => {}
                        }
                    }
                    serde_yaml_ng::Value::String(key) => {
                        options.insert(key, serde_json::to_value(value)?);
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    Ok((options, properties))
}

/// Builds, populates, reads and saves properties.
#[derive(Clone, Copy)]
pub struct PropertyContext<'a> {
    registry: &'a PropertyTypeRegistry,
    store: Option<&'a dyn MetaStore>,
    default_sort_order: i64,
}

impl<'a> PropertyContext<'a> {
    /// A context without storage; values come from declarations only.
    pub fn new(registry: &'a PropertyTypeRegistry) -> Self {
        Self {
            registry,
            store: None,
            default_sort_order: DEFAULT_SORT_ORDER,
        }
    }

    /// Read and write values through `store`.
    pub fn with_store(mut self, store: &'a dyn MetaStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_default_sort_order(mut self, sort_order: i64) -> Self {
        self.default_sort_order = sort_order;
        self
    }

    pub fn registry(&self) -> &'a PropertyTypeRegistry {
        self.registry
    }

    pub fn store(&self) -> Option<&'a dyn MetaStore> {
        self.store
    }

    /// Resolve a box source into its options and declarations.
    ///
    /// A fragment that fails to load yields no options and no declarations.
    pub fn build(&self, source: PropertySource) -> (Map<String, Value>, Declarations) {
        match source {
            PropertySource::Inline(declarations) => {
                let mut options = Map::new();
                let (title, required) = inline_title(&declarations);
                options.insert("title".to_string(), Value::String(title));
                if required {
                    options.insert("_required".to_string(), Value::Bool(true));
                }
                (options, declarations)
            }
            PropertySource::Definition { path, values } => match load_fragment(&path, &values) {
                Ok((options, properties)) => {
                    debug!(path = %path.display(), properties = properties.len(), "loaded fragment");
                    (options, Declarations::from_value(Value::Array(properties)))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping fragment");
                    (Map::new(), Declarations::default())
                }
            },
            PropertySource::Title { title, properties } => {
                let mut options = Map::new();
                options.insert("title".to_string(), Value::String(title));
                (options, properties)
            }
        }
    }

    /// Promote a lone implicit declaration to a box property.
    ///
    /// A disabled implicit declaration leaves the box empty.
    pub fn normalize_box_properties(&self, declarations: Declarations) -> Vec<PropertyEntry> {
        match declarations {
            Declarations::Single(property) => vec![PropertyEntry::Property(property)],
            Declarations::Implicit(options) if options.is_empty() => Vec::new(),
            Declarations::Implicit(options) => {
                if entry_is_tab(&options) {
                    return vec![PropertyEntry::Raw(options)];
                }
                match self.materialize(&options, true) {
                    Some(property) if property.disabled => Vec::new(),
                    Some(mut property) => {
                        property.box_property = true;
                        vec![property.into()]
                    }
                    None => Vec::new(),
                }
            }
            Declarations::List(entries) => entries,
        }
    }

    /// Build a full property from an options map.
    ///
    /// Options are layered: baseline options, then the type's default
    /// settings under `options`, then the caller's options. With
    /// `fetch_value` the value is read from the store and falls back to
    /// `default_value`. `None` when the type is missing or unregistered.
    pub fn materialize(&self, options: &Map<String, Value>, fetch_value: bool) -> Option<Property> {
        let type_name = options.get("type").and_then(Value::as_str).unwrap_or_default();
        let Some(handler) = self.registry.resolve(type_name) else {
            debug!(type_ = %type_name, "skipping property with unknown type");
            return None;
        };

        let mut settings = handler.default_settings();
        if let Some(Value::Object(user)) = options.get("options") {
            settings.extend(user.clone());
        }

        let mut merged = default_options();
        merged.extend(options.clone());
        merged.insert("options".to_string(), Value::Object(settings));
        merged.insert("type".to_string(), json!(handler.type_name()));

        let mut property: Property = match serde_json::from_value(Value::Object(merged)) {
            Ok(property) => property,
            Err(e) => {
                warn!(type_ = %type_name, error = %e, "skipping malformed property");
                return None;
            }
        };

        if property.slug.is_empty() {
            property.slug = slugify(&property.title);
        }

        if fetch_value {
            let stored = self
                .store
                .map(|store| handler.read_value(&property, store))
                .filter(|value| !is_empty_value(value));
            property.value = stored.unwrap_or_else(|| property.default_value.clone());
        }

        if !property.raw {
            let value = std::mem::take(&mut property.value);
            property.value = handler.shape_value(&property, value);
        }

        Some(property)
    }

    /// Normalize declarations into an ordered property list.
    ///
    /// Raw declarations are materialized, unknown types dropped. A list
    /// led by a tab is returned as is; otherwise it is stably sorted by
    /// `sort_order`.
    pub fn populate(&self, declarations: Declarations) -> Vec<PropertyEntry> {
        if let Declarations::Single(property) = declarations {
            return vec![PropertyEntry::Property(property)];
        }

        let mut entries: Vec<PropertyEntry> = self
            .normalize_box_properties(declarations)
            .into_iter()
            .filter_map(|entry| match entry {
                PropertyEntry::Raw(options) if !entry_is_tab(&options) => {
                    self.materialize(&options, true).map(PropertyEntry::from)
                }
                other => Some(other),
            })
            .collect();

        if entries.first().map(PropertyEntry::is_tab).unwrap_or(true) {
            return entries;
        }

        let default = self.default_sort_order;
        entries.sort_by_key(|entry| entry.sort_order(default));
        entries
    }

    /// Run the type's update hook and persist `value` for `property`.
    /// Returns false without a store or a registered type.
    pub fn save(&self, property: &Property, value: Value) -> bool {
        let Some(store) = self.store else {
            return false;
        };
        let Some(handler) = self.registry.resolve(property) else {
            return false;
        };

        let envelope = MetaEnvelope {
            type_: handler.type_name().to_string(),
            slug: property.slug.clone(),
            value: handler.update_value(property, value),
            post_id: store.id(),
        };
        persist_to(&envelope, store);
        true
    }

    /// Rebuild a property from what is stored under `slug`, using the type
    /// recorded in its type key.
    pub fn load_stored(&self, slug: &str) -> Option<Property> {
        let store = self.store?;
        let stored_type = store.get(&store.type_key(slug))?;
        let mut options = Map::new();
        options.insert("type".to_string(), json!(stored_type.as_str()?));
        options.insert("slug".to_string(), json!(slug));
        self.materialize(&options, true)
    }
}

fn entry_is_tab(options: &Map<String, Value>) -> bool {
    options.get("tab").map(is_truthy).unwrap_or(false)
}

/// Title of inline declarations and whether the box is required.
fn inline_title(declarations: &Declarations) -> (String, bool) {
    let from_map = |map: &Map<String, Value>| {
        map.get("title")
            .or_else(|| map.get("options").and_then(|o| o.get("title")))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    match declarations {
        Declarations::Single(property) => (property.title.clone(), false),
        Declarations::Implicit(map) => (from_map(map).unwrap_or_default(), false),
        Declarations::List(entries) => match entries.first() {
            Some(PropertyEntry::Property(p)) => (p.title.clone(), !p.sidebar && p.required),
            Some(PropertyEntry::Raw(map)) => (from_map(map).unwrap_or_default(), false),
            None => (String::new(), false),
        },
    }
}
