//! String-keyed defaults registered by the host.
//!
//! The resolver reads fallback entry type ids from here, keyed
//! `entry_type_id.<domain>.<discriminator>`.

use std::collections::HashMap;

use serde_json::Value;

/// Key of the default entry type id for terms of `taxonomy`.
pub fn taxonomy_key(taxonomy: &str) -> String {
    format!("entry_type_id.taxonomy.{taxonomy}")
}

/// Key of the default entry type id for posts of `post_type`.
pub fn post_type_key(post_type: &str) -> String {
    format!("entry_type_id.post_type.{post_type}")
}

#[derive(Debug, Clone, Default)]
pub struct Container {
    values: HashMap<String, Value>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn make(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Bind `value` under `key`, replacing any previous binding.
    pub fn bind(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// The string bound under `key`, if any.
    pub fn make_string(&self, key: &str) -> Option<&str> {
        self.make(key).and_then(Value::as_str)
    }
}
