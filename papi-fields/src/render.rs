//! Render gating.
//!
//! Markup is the host's business. A property type describes its widget to a
//! [`PropertyRenderer`]; this module decides which properties get that far.

use serde_json::{Map, Value};
use tracing::debug;

use crate::codec;
use crate::property_type::PropertyTypeRegistry;
use crate::request::RequestContext;
use crate::types::{Property, PropertyEntry};

/// Description of one input widget.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    /// Input kind (`text`, `textarea`, `select`, ...).
    pub input: String,
    /// Form field name.
    pub name: String,
    pub value: Value,
    pub attributes: Map<String, Value>,
}

impl Widget {
    /// A widget for `property` named after its namespaced slug.
    pub fn for_property(property: &Property, input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            name: codec::with_namespace(&property.slug),
            value: property.value.clone(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Receiver of widget descriptions.
pub trait PropertyRenderer {
    fn field(&mut self, property: &Property, widget: Widget);

    /// Start of a composite property (repeater rows follow).
    fn begin_group(&mut self, _property: &Property) {}

    fn end_group(&mut self, _property: &Property) {}

    /// A tab-leading list, handed over as declared.
    fn tabs(&mut self, _entries: &[PropertyEntry]) {}
}

/// Collects widgets in render order.
#[derive(Debug, Default)]
pub struct CollectingRenderer {
    pub widgets: Vec<Widget>,
    pub groups: Vec<String>,
    pub tabs: Vec<PropertyEntry>,
}

impl CollectingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the collected widgets.
    pub fn names(&self) -> Vec<&str> {
        self.widgets.iter().map(|w| w.name.as_str()).collect()
    }
}

impl PropertyRenderer for CollectingRenderer {
    fn field(&mut self, _property: &Property, widget: Widget) {
        self.widgets.push(widget);
    }

    fn begin_group(&mut self, property: &Property) {
        self.groups.push(property.slug.clone());
    }

    fn tabs(&mut self, entries: &[PropertyEntry]) {
        self.tabs.extend_from_slice(entries);
    }
}

/// Render one property if it passes the gates. Returns whether it rendered.
///
/// Skipped silently: an empty type, a capability the user lacks, an
/// unregistered type, a language other than the request's, or a disabled
/// property.
pub fn render_property(
    property: &Property,
    registry: &PropertyTypeRegistry,
    request: &RequestContext,
    renderer: &mut dyn PropertyRenderer,
) -> bool {
    if property.type_.is_empty() {
        return false;
    }

    if !request.user_can(&property.capabilities) {
        debug!(slug = %property.slug, "skipping property, missing capability");
        return false;
    }

    let Some(handler) = registry.resolve(property) else {
        debug!(slug = %property.slug, type_ = %property.type_, "skipping property, unknown type");
        return false;
    };

    if let Some(lang) = &property.lang {
        if request.lang().as_deref() != Some(lang.as_str()) {
            return false;
        }
    }

    if property.disabled {
        return false;
    }

    handler.render(property, renderer);
    true
}

/// Render a populated list. Tab-leading lists go to the tab hook unchanged.
pub fn render_properties(
    entries: &[PropertyEntry],
    registry: &PropertyTypeRegistry,
    request: &RequestContext,
    renderer: &mut dyn PropertyRenderer,
) -> usize {
    if entries.first().map(PropertyEntry::is_tab).unwrap_or(false) {
        renderer.tabs(entries);
        return 0;
    }

    entries
        .iter()
        .filter_map(PropertyEntry::as_property)
        .filter(|p| render_property(p, registry, request, renderer))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property(value: Value) -> Property {
        serde_json::from_value(value).unwrap()
    }

    fn render(p: &Property, request: &RequestContext) -> bool {
        let registry = PropertyTypeRegistry::with_builtins();
        let mut out = CollectingRenderer::new();
        render_property(p, &registry, request, &mut out)
    }

    #[test]
    fn test_renders_string_widget() {
        let registry = PropertyTypeRegistry::with_builtins();
        let mut out = CollectingRenderer::new();
        let p = property(json!({"type": "string", "slug": "name", "value": "Fredrik"}));
        assert!(render_property(&p, &registry, &RequestContext::new(), &mut out));
        assert_eq!(out.names(), vec!["papi_name"]);
        assert_eq!(out.widgets[0].input, "text");
        assert_eq!(out.widgets[0].value, json!("Fredrik"));
    }

    #[test]
    fn test_gates() {
        let request = RequestContext::new();
        assert!(!render(&property(json!({"type": "", "slug": "a"})), &request));
        assert!(!render(&property(json!({"type": "fake", "slug": "a"})), &request));
        assert!(!render(
            &property(json!({"type": "string", "slug": "a", "disabled": true})),
            &request
        ));

        let gated = property(json!({"type": "string", "slug": "a", "capabilities": ["kvack"]}));
        assert!(!render(&gated, &request));
        assert!(render(&gated, &RequestContext::new().with_capability("kvack")));

        let swedish = property(json!({"type": "string", "slug": "a", "lang": "sv"}));
        assert!(!render(&swedish, &request));
        assert!(render(&swedish, &RequestContext::new().with_query("lang", "SV")));
    }

    #[test]
    fn test_tab_leading_list_goes_to_tab_hook() {
        let registry = PropertyTypeRegistry::with_builtins();
        let mut out = CollectingRenderer::new();
        let entries = vec![PropertyEntry::Raw(
            json!({"tab": true, "title": "Content"}).as_object().cloned().unwrap(),
        )];
        assert_eq!(
            render_properties(&entries, &registry, &RequestContext::new(), &mut out),
            0
        );
        assert_eq!(out.tabs.len(), 1);
        assert!(out.widgets.is_empty());
    }
}
