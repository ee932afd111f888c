//! Request bodies that may contain element references.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Serialize, Serializer, ser::Error as _};
use serde_json::{Map, Number, Value};
use tracing::{debug, instrument, warn};

use crate::{
    element::{ElementValue, ValueKind},
    error::{ElementsError, Result},
};

/// A request body node.
///
/// Exactly one variant is active per node. References are resolved to
/// [`RequestNode::Scalar`] by [`resolve_references`].
#[derive(Clone)]
pub enum RequestNode {
    /// Object with unique keys.
    Map(BTreeMap<String, RequestNode>),
    /// Ordered array.
    Array(Vec<RequestNode>),
    /// Unresolved element reference.
    Reference(Arc<dyn ElementValue>),
    /// Any non-container JSON value, passed through untouched.
    Scalar(Value),
}

impl RequestNode {
    /// Wraps an element as a reference node.
    #[must_use]
    pub fn reference<E: ElementValue + 'static>(element: Arc<E>) -> Self {
        Self::Reference(element)
    }

    /// Returns an empty map node.
    #[must_use]
    pub const fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Inserts into a map node; returns the node for chaining.
    ///
    /// Inserting into a non-map node replaces it with a single-entry map.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Self>) -> Self {
        if let Self::Map(entries) = &mut self {
            entries.insert(key.into(), value.into());
            return self;
        }
        let mut entries = BTreeMap::new();
        entries.insert(key.into(), value.into());
        Self::Map(entries)
    }

    /// Looks up a member of a map node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Returns true if any reference remains anywhere in the tree.
    #[must_use]
    pub fn has_references(&self) -> bool {
        match self {
            Self::Map(entries) => entries.values().any(Self::has_references),
            Self::Array(items) => items.iter().any(Self::has_references),
            Self::Reference(_) => true,
            Self::Scalar(_) => false,
        }
    }

    /// Converts a fully resolved tree into JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::InvalidInput`] if a reference is still present.
    pub fn into_json(self) -> Result<Value> {
        match self {
            Self::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, node) in entries {
                    map.insert(key, node.into_json()?);
                }
                Ok(Value::Object(map))
            }
            Self::Array(items) => {
                items.into_iter().map(Self::into_json).collect::<Result<Vec<_>>>().map(Value::Array)
            }
            Self::Reference(element) => Err(ElementsError::InvalidInput(format!(
                "element {} was not resolved",
                element.element_id()
            ))),
            Self::Scalar(value) => Ok(value),
        }
    }
}

impl From<Value> for RequestNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            Value::Array(items) => Self::Array(items.into_iter().map(Into::into).collect()),
            scalar => Self::Scalar(scalar),
        }
    }
}

impl From<&str> for RequestNode {
    fn from(value: &str) -> Self {
        Self::Scalar(Value::String(value.to_owned()))
    }
}

impl From<String> for RequestNode {
    fn from(value: String) -> Self {
        Self::Scalar(Value::String(value))
    }
}

impl From<Vec<Self>> for RequestNode {
    fn from(items: Vec<Self>) -> Self {
        Self::Array(items)
    }
}

impl fmt::Debug for RequestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Self::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Reference(element) => write!(f, "Reference({})", element.element_id()),
            Self::Scalar(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for RequestNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Map(entries) => entries.serialize(serializer),
            Self::Array(items) => items.serialize(serializer),
            Self::Reference(element) => Err(S::Error::custom(format!(
                "element {} was not resolved",
                element.element_id()
            ))),
            Self::Scalar(value) => value.serialize(serializer),
        }
    }
}

/// Coerces a raw element string into JSON according to its declared kind.
///
/// # Errors
///
/// Returns [`ElementsError::InvalidInput`] if the string does not parse as the
/// declared kind, or parses to a non-finite float.
pub fn coerce(raw: &str, kind: ValueKind) -> Result<Value> {
    let invalid = |what: &str| ElementsError::InvalidInput(format!("value is not a valid {what}"));
    match kind {
        ValueKind::Int => raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<u64>().map(Value::from))
            .map_err(|_| invalid("integer")),
        ValueKind::Double => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("double")),
        ValueKind::Bool => raw.parse::<bool>().map(Value::Bool).map_err(|_| invalid("boolean")),
        ValueKind::String | ValueKind::None => Ok(Value::String(raw.to_owned())),
    }
}

fn resolve_element(element: &dyn ElementValue) -> Result<Value> {
    let Some(raw) = element.read_if_ready() else {
        warn!(element_id = element.element_id(), "element reference is not complete");
        return Err(ElementsError::InvalidInput(format!(
            "element {} is not complete",
            element.element_id()
        )));
    };
    coerce(&raw, element.value_kind()).map_err(|e| match e {
        ElementsError::InvalidInput(msg) => {
            ElementsError::InvalidInput(format!("element {}: {msg}", element.element_id()))
        }
        other => other,
    })
}

fn resolved(node: &RequestNode, count: &mut usize) -> Result<RequestNode> {
    Ok(match node {
        RequestNode::Map(entries) => {
            let mut out = BTreeMap::new();
            for (key, child) in entries {
                out.insert(key.clone(), resolved(child, count)?);
            }
            RequestNode::Map(out)
        }
        RequestNode::Array(items) => RequestNode::Array(
            items.iter().map(|child| resolved(child, count)).collect::<Result<_>>()?,
        ),
        RequestNode::Reference(element) => {
            *count += 1;
            RequestNode::Scalar(resolve_element(element.as_ref())?)
        }
        RequestNode::Scalar(value) => RequestNode::Scalar(value.clone()),
    })
}

/// Replaces every element reference in `node` with its typed value.
///
/// The walk is depth-first over maps and arrays. It builds a resolved copy
/// and swaps it in only if every reference resolved, so on error `node` is
/// left exactly as it was.
///
/// # Errors
///
/// Returns [`ElementsError::InvalidInput`] on the first reference that is not
/// ready or whose value does not match its declared kind.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use secure_elements::{
///     element::{ElementValueReference, ValueKind},
///     json::{RequestNode, resolve_references},
/// };
///
/// # fn example() -> secure_elements::error::Result<()> {
/// let cvc = Arc::new(ElementValueReference::from_value("cvc", ValueKind::String, "123"));
/// let mut body = RequestNode::map()
///     .with("type", "card")
///     .with("data", RequestNode::map().with("cvc", RequestNode::reference(cvc)));
///
/// resolve_references(&mut body)?;
/// assert_eq!(body.into_json()?["data"]["cvc"], "123");
/// # Ok(())
/// # }
/// ```
#[instrument(skip(node))]
pub fn resolve_references(node: &mut RequestNode) -> Result<()> {
    let mut count = 0;
    let out = resolved(node, &mut count)?;
    *node = out;
    debug!(references = count, "element references resolved");
    Ok(())
}
