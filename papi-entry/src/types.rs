//! Entry type definitions.
//!
//! One YAML file describes one entry type:
//!
//! ```yaml
//! type: page
//! name: Simple page
//! template: pages/simple.php
//! boxes:
//!   - title: Content
//!     properties:
//!       - type: string
//!         title: Name
//!   - boxes/seo.yaml
//! ```
//!
//! Files without a known `type` and a `name` are fragments (shared box
//! declarations) and never become entry types.

use std::fmt;
use std::path::{Path, PathBuf};

use papi_fields::{
    Declarations, MetaType, Property, PropertyContext, PropertyEntry, PropertySource,
    RequestContext,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EntryError, Result};

/// Domain classifier of an entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryTypeKind {
    Page,
    Entry,
    Option,
    Taxonomy,
}

impl EntryTypeKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "page" => Some(Self::Page),
            "entry" => Some(Self::Entry),
            "option" => Some(Self::Option),
            "taxonomy" => Some(Self::Taxonomy),
            _ => None,
        }
    }

    /// Storage domain of entries of this kind.
    pub fn meta_type(&self) -> MetaType {
        match self {
            Self::Page | Self::Entry => MetaType::Post,
            Self::Taxonomy => MetaType::Term,
            Self::Option => MetaType::Option,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Entry => "entry",
            Self::Option => "option",
            Self::Taxonomy => "taxonomy",
        }
    }
}

impl fmt::Display for EntryTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A box declaration: a fragment file reference or an inline map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoxDef {
    Reference(String),
    Inline(Map<String, Value>),
}

/// Entry type file as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryTypeDef {
    #[serde(rename = "type")]
    pub kind: EntryTypeKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub post_types: Vec<String>,
    #[serde(default)]
    pub taxonomies: Vec<String>,
    #[serde(default)]
    pub boxes: Vec<BoxDef>,
}

/// A built box with its populated properties.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryBox {
    pub title: String,
    pub options: Map<String, Value>,
    pub properties: Vec<PropertyEntry>,
}

/// A loaded entry type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryType {
    /// Path relative to its search directory, without extension.
    pub id: String,
    pub file_path: PathBuf,
    /// Search directory the file was found in.
    pub root: PathBuf,
    pub kind: EntryTypeKind,
    pub name: String,
    pub description: String,
    pub template: String,
    pub sort_order: i64,
    pub capabilities: Vec<String>,
    pub post_types: Vec<String>,
    pub taxonomies: Vec<String>,
    pub box_defs: Vec<BoxDef>,
}

/// Whether parsed YAML declares an entry type rather than a fragment.
fn declares_entry_type(yaml: &serde_yaml_ng::Value) -> bool {
    let kind = yaml
        .get("type")
        .and_then(serde_yaml_ng::Value::as_str)
        .and_then(EntryTypeKind::parse);
    let name = yaml.get("name").and_then(serde_yaml_ng::Value::as_str);
    kind.is_some() && name.is_some()
}

impl EntryType {
    /// Parse a definition file. `Ok(None)` for fragments.
    pub fn from_yaml(
        id: impl Into<String>,
        file_path: &Path,
        root: &Path,
        content: &str,
        default_sort_order: i64,
    ) -> Result<Option<Self>> {
        let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_str(content)?;
        if !declares_entry_type(&yaml) {
            return Ok(None);
        }

        let def: EntryTypeDef = serde_yaml_ng::from_value(yaml)
            .map_err(|e| EntryError::invalid(file_path, e.to_string()))?;

        Ok(Some(Self {
            id: id.into(),
            file_path: file_path.to_path_buf(),
            root: root.to_path_buf(),
            kind: def.kind,
            name: def.name,
            description: def.description,
            template: def.template,
            sort_order: def.sort_order.unwrap_or(default_sort_order),
            capabilities: def.capabilities,
            post_types: def.post_types,
            taxonomies: def.taxonomies,
            box_defs: def.boxes,
        }))
    }

    pub fn meta_type(&self) -> MetaType {
        self.kind.meta_type()
    }

    /// Whether the user may edit entries of this type.
    pub fn user_can(&self, request: &RequestContext) -> bool {
        request.user_can(&self.capabilities)
    }

    /// Whether this type applies to `post_type` (pages and entries) or
    /// `taxonomy` (taxonomy types). An empty list applies everywhere.
    pub fn applies_to(&self, object_subtype: &str) -> bool {
        let list = match self.kind {
            EntryTypeKind::Taxonomy => &self.taxonomies,
            EntryTypeKind::Option => return true,
            EntryTypeKind::Page | EntryTypeKind::Entry => &self.post_types,
        };
        list.is_empty() || list.iter().any(|s| s == object_subtype)
    }

    /// Resolve a box file reference: absolute, next to this definition,
    /// or under its search directory.
    fn box_path(&self, reference: &str) -> PathBuf {
        let reference = Path::new(reference);
        if reference.is_absolute() {
            return reference.to_path_buf();
        }
        let sibling = self
            .file_path
            .parent()
            .map(|dir| dir.join(reference))
            .filter(|path| path.is_file());
        sibling.unwrap_or_else(|| self.root.join(reference))
    }

    fn box_source(&self, def: &BoxDef) -> (PropertySource, Map<String, Value>) {
        match def {
            BoxDef::Reference(reference) => (
                PropertySource::Definition {
                    path: self.box_path(reference),
                    values: Map::new(),
                },
                Map::new(),
            ),
            BoxDef::Inline(map) => {
                let mut options = map.clone();
                let properties = options.remove("properties").unwrap_or(Value::Null);
                let source = match options.get("title").and_then(Value::as_str) {
                    Some(title) => PropertySource::Title {
                        title: title.to_string(),
                        properties: Declarations::from_value(properties),
                    },
                    None => PropertySource::Inline(Declarations::from_value(properties)),
                };
                (source, options)
            }
        }
    }

    /// Build every box, sorted by its `sort_order` option.
    pub fn boxes(&self, ctx: &PropertyContext<'_>) -> Vec<EntryBox> {
        let mut boxes: Vec<(i64, EntryBox)> = self
            .box_defs
            .iter()
            .map(|def| {
                let (source, extra) = self.box_source(def);
                let (mut options, declarations) = ctx.build(source);
                options.extend(extra);
                let title = options
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let sort_order = options
                    .get("sort_order")
                    .and_then(Value::as_i64)
                    .unwrap_or(self.sort_order);
                let properties = ctx.populate(declarations);
                (
                    sort_order,
                    EntryBox {
                        title,
                        options,
                        properties,
                    },
                )
            })
            .collect();
        boxes.sort_by_key(|(order, _)| *order);
        boxes.into_iter().map(|(_, b)| b).collect()
    }

    /// Every property of every box, with tabs flattened.
    pub fn properties(&self, ctx: &PropertyContext<'_>) -> Vec<Property> {
        let mut properties = Vec::new();
        for entry_box in self.boxes(ctx) {
            for entry in entry_box.properties {
                match entry {
                    PropertyEntry::Property(p) => properties.push(*p),
                    tab if tab.is_tab() => {
                        let declarations = Declarations::List(
                            tab.tab_properties()
                                .into_iter()
                                .map(PropertyEntry::Raw)
                                .collect(),
                        );
                        properties.extend(
                            ctx.populate(declarations)
                                .into_iter()
                                .filter_map(|e| match e {
                                    PropertyEntry::Property(p) => Some(*p),
                                    PropertyEntry::Raw(_) => None,
                                }),
                        );
                    }
                    PropertyEntry::Raw(_) => {}
                }
            }
        }
        properties
    }

    /// The property with `slug`, if declared.
    pub fn property(&self, ctx: &PropertyContext<'_>, slug: &str) -> Option<Property> {
        self.properties(ctx).into_iter().find(|p| p.slug == slug)
    }
}
