//! Key codec: maps logical property paths onto the flat storage key space.
//!
//! Storage backends only know flat string keys. This module owns every
//! transform between a property slug and the keys it occupies:
//!
//! - the companion *type key* (`slug_property`) recording which property type
//!   wrote a value,
//! - the `papi_` namespace prefix separating managed keys from arbitrary ones,
//! - the repeater encoding, which spreads an ordered list of child maps over
//!   `slug_<index>_<child>` keys plus a `slug -> count` entry.
//!
//! `flatten_repeater_values` and `unflatten_repeater_values` are exact
//! inverses for lists of flat maps.

use serde_json::{Map, Value};

/// Suffix marking a type key.
pub const PROPERTY_TYPE_SUFFIX: &str = "_property";

/// Prefix marking keys managed by this library.
pub const NAMESPACE_PREFIX: &str = "papi_";

fn split_leading_underscores(key: &str) -> (&str, &str) {
    let rest = key.trim_start_matches('_');
    (&key[..key.len() - rest.len()], rest)
}

/// Add the namespace prefix after any leading underscores, unless present.
pub fn with_namespace(key: &str) -> String {
    let (lead, rest) = split_leading_underscores(key);
    if rest.starts_with(NAMESPACE_PREFIX) {
        key.to_string()
    } else {
        format!("{lead}{NAMESPACE_PREFIX}{rest}")
    }
}

/// Remove the namespace prefix, keeping leading underscores.
pub fn without_namespace(key: &str) -> String {
    let (lead, rest) = split_leading_underscores(key);
    match rest.strip_prefix(NAMESPACE_PREFIX) {
        Some(stripped) => format!("{lead}{stripped}"),
        None => key.to_string(),
    }
}

/// Ensure the key starts with an underscore (hidden from generic meta UIs).
pub fn hidden(key: &str) -> String {
    if key.starts_with('_') {
        key.to_string()
    } else {
        format!("_{key}")
    }
}

/// The type key for `slug`.
///
/// A bracketed slug keeps its bracket part after the suffix:
/// `my_slug[]` becomes `my_slug_property[]`. With `use_prefix` the namespace
/// prefix is kept as given, otherwise it is stripped.
pub fn property_type_key(slug: &str, use_prefix: bool) -> String {
    if let Some(base) = slug.strip_suffix(']') {
        return match slug.rfind('[') {
            Some(open) => {
                let (base, bracket) = slug.split_at(open);
                format!("{}{}", property_type_key(base, use_prefix), bracket)
            }
            None => format!("{}]", property_type_key(base, use_prefix)),
        };
    }

    let key = format!("{slug}{PROPERTY_TYPE_SUFFIX}");
    if use_prefix {
        key
    } else {
        without_namespace(&key)
    }
}

/// The hidden (underscore-led) type key for `slug`.
pub fn property_type_key_hidden(slug: &str, use_prefix: bool) -> String {
    hidden(&property_type_key(slug, use_prefix))
}

/// Whether `key` is a type key.
pub fn is_property_type_key(key: &str) -> bool {
    key.ends_with(PROPERTY_TYPE_SUFFIX)
}

/// Storage key of `child` within repeater item `index` of `slug`.
pub fn repeater_item_key(slug: &str, index: usize, child: &str) -> String {
    let key = format!("{slug}_{index}_{child}");
    if is_property_type_key(&key) {
        hidden(&key)
    } else {
        key
    }
}

/// Largest row count decoded from storage. Larger counts read as absent.
pub const MAX_REPEATER_ROWS: usize = 10_000;

/// Read a stored repeater count (integer or numeric string).
///
/// Negative, fractional-overflow and oversized counts are `None`.
pub fn repeater_count(value: &Value) -> Option<usize> {
    let max = MAX_REPEATER_ROWS as u64;
    let count = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f <= max as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    if count > max {
        return None;
    }
    usize::try_from(count).ok()
}

/// Encode an ordered list of child maps into flat keys plus a count entry.
pub fn flatten_repeater_values(values: &[Map<String, Value>], slug: &str) -> Map<String, Value> {
    let mut results = Map::new();

    for (index, item) in values.iter().enumerate() {
        for (key, value) in item {
            results.insert(repeater_item_key(slug, index, key), value.clone());
        }
    }

    results.insert(slug.to_string(), Value::from(values.len()));
    results
}

/// Decode flat repeater keys back into an ordered list of child maps.
///
/// The count under `slug` is read first; without it the result is empty.
pub fn unflatten_repeater_values(values: &Map<String, Value>, slug: &str) -> Vec<Map<String, Value>> {
    let Some(count) = values.get(slug).and_then(repeater_count) else {
        return Vec::new();
    };

    (0..count)
        .map(|index| {
            let plain = format!("{slug}_{index}_");
            let hidden_prefix = hidden(&plain);
            let mut item = Map::new();

            for (key, value) in values {
                let child = key.strip_prefix(plain.as_str()).or_else(|| {
                    key.strip_prefix(hidden_prefix.as_str())
                        .filter(|_| is_property_type_key(key))
                });
                if let Some(child) = child {
                    item.insert(child.to_string(), value.clone());
                }
            }

            item
        })
        .collect()
}
