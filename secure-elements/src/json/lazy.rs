//! Lazily readable views over response bodies.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::{Map, Value};

use super::request::{RequestNode, coerce};
use crate::{
    element::{ElementValue, ElementValueReference, ValueKind},
    error::Result,
};

/// A decoded response body whose leaves may be deferred references.
///
/// Containers keep the shape of the source JSON.
#[derive(Debug, Clone)]
pub enum LazyJson {
    /// Object.
    Object(BTreeMap<String, LazyJson>),
    /// Array.
    Array(Vec<LazyJson>),
    /// Leaf wrapped in a deferred reference.
    Reference(ElementValueReference),
    /// Leaf kept as-is.
    Raw(Value),
}

impl LazyJson {
    /// Looks up an object member.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Object(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Looks up an array element.
    #[must_use]
    pub fn index(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Array(items) => items.get(index),
            _ => None,
        }
    }

    /// Returns the reference if this leaf is wrapped.
    #[must_use]
    pub const fn as_reference(&self) -> Option<&ElementValueReference> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Materializes the whole tree back into JSON.
    ///
    /// This forces every deferred read.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ElementsError::InvalidInput`] if a reference
    /// reads back a value that does not match its kind.
    pub fn materialize(&self) -> Result<Value> {
        match self {
            Self::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, child) in entries {
                    map.insert(key.clone(), child.materialize()?);
                }
                Ok(Value::Object(map))
            }
            Self::Array(items) => {
                items.iter().map(Self::materialize).collect::<Result<Vec<_>>>().map(Value::Array)
            }
            Self::Reference(reference) => coerce(&reference.read(), reference.value_kind()),
            Self::Raw(value) => Ok(value.clone()),
        }
    }
}

impl From<LazyJson> for RequestNode {
    fn from(lazy: LazyJson) -> Self {
        match lazy {
            LazyJson::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            LazyJson::Array(items) => Self::Array(items.into_iter().map(Into::into).collect()),
            LazyJson::Reference(reference) => Self::Reference(Arc::new(reference)),
            LazyJson::Raw(value) => Self::Scalar(value),
        }
    }
}

fn kind_of(value: &Value) -> ValueKind {
    match value {
        Value::Bool(_) => ValueKind::Bool,
        Value::Number(n) if n.is_f64() => ValueKind::Double,
        Value::Number(_) => ValueKind::Int,
        Value::String(_) => ValueKind::String,
        _ => ValueKind::None,
    }
}

fn leaf_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Wraps a leaf in a complete reference whose read is deferred.
fn wrap_leaf(path: &str, value: Value) -> LazyJson {
    let kind = kind_of(&value);
    LazyJson::Reference(ElementValueReference::new(path, kind, true, move || leaf_text(&value)))
}

fn walk(value: Value, path: &str, leaf: &dyn Fn(&str, Value) -> LazyJson) -> LazyJson {
    match value {
        Value::Object(map) => LazyJson::Object(
            map.into_iter()
                .map(|(key, child)| {
                    let child_path = format!("{path}.{key}");
                    let wrapped = walk(child, &child_path, leaf);
                    (key, wrapped)
                })
                .collect(),
        ),
        Value::Array(items) => LazyJson::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, child)| walk(child, &format!("{path}[{i}]"), leaf))
                .collect(),
        ),
        scalar => leaf(path, scalar),
    }
}

/// Replaces every scalar leaf with a deferred reference.
///
/// Each reference reports the JSON kind of its leaf and reads back the
/// string form of the value (`null` reads as `"null"`). Reference ids are the
/// leaf's path from the root, e.g. `$.data.number`.
///
/// # Examples
///
/// ```
/// use secure_elements::{element::ElementValue, json::wrap_for_traversal};
/// use serde_json::json;
///
/// let lazy = wrap_for_traversal(json!({"data": {"number": "4242424242424242"}}));
/// let number = lazy.get("data").and_then(|d| d.get("number")).and_then(|n| n.as_reference());
/// assert_eq!(number.map(|n| n.element_id()), Some("$.data.number"));
/// ```
#[must_use]
pub fn wrap_for_traversal(value: Value) -> LazyJson {
    walk(value, "$", &wrap_leaf)
}

/// Wraps only string leaves; numbers, booleans and nulls stay raw.
///
/// Used for token reads where only the string fields carry sensitive data.
#[must_use]
pub fn wrap_strings_only(value: Value) -> LazyJson {
    walk(value, "$", &|path, leaf| match leaf {
        Value::String(_) => wrap_leaf(path, leaf),
        other => LazyJson::Raw(other),
    })
}

/// Rebuilds the tree with every leaf kept raw.
#[must_use]
pub fn wrap_raw(value: Value) -> LazyJson {
    walk(value, "$", &|_, leaf| LazyJson::Raw(leaf))
}
