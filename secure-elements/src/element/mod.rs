//! Opaque element values.
//!
//! Hosts never see the plaintext held by an element. They pass an
//! [`ElementValue`] handle into a request body and the crate reads it only
//! while building the outbound request (see [`crate::json`]).

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Declared type of an element's value, used to coerce the raw string read
/// from the element into a typed JSON value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Parsed as a 64-bit integer, signed or unsigned.
    Int,
    /// Parsed as a finite float.
    Double,
    /// Parsed as `true` / `false`.
    Bool,
    /// Passed through as-is.
    String,
    /// No declared type; passed through as a string.
    #[default]
    None,
}

/// Read capability exposed by an element holding sensitive input.
///
/// Implementations are owned by the element; the crate only reads through
/// this trait and never mutates the element.
pub trait ElementValue: Send + Sync {
    /// Identifier used in logs and error messages. Never the value itself.
    fn element_id(&self) -> &str;

    /// Whether the element holds a complete, valid value.
    fn is_ready(&self) -> bool;

    /// Declared kind of the value.
    fn value_kind(&self) -> ValueKind;

    /// Reads the raw value.
    ///
    /// Reading an element that is not ready returns whatever partial text it
    /// holds. Prefer [`read_if_ready`](Self::read_if_ready).
    fn read(&self) -> String;

    /// Reads the value only if it is ready, as one step.
    ///
    /// Elements whose input can change concurrently override this so the
    /// readiness check and the read observe the same state.
    fn read_if_ready(&self) -> Option<String> {
        self.is_ready().then(|| self.read())
    }
}

type Thunk = Arc<dyn Fn() -> String + Send + Sync>;

/// A concrete [`ElementValue`] backed by a deferred read.
///
/// Produced by [`crate::json::wrap_for_traversal`] for values read back from a
/// response, and usable by hosts that need to hand a computed value to a
/// request without materializing it early.
#[derive(Clone)]
pub struct ElementValueReference {
    id: String,
    kind: ValueKind,
    complete: bool,
    thunk: Thunk,
}

impl ElementValueReference {
    /// Creates a reference around a deferred read.
    #[must_use]
    pub fn new<F>(id: impl Into<String>, kind: ValueKind, complete: bool, read: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self { id: id.into(), kind, complete, thunk: Arc::new(read) }
    }

    /// Creates a complete reference over an already known value.
    #[must_use]
    pub fn from_value(id: impl Into<String>, kind: ValueKind, value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self::new(id, kind, true, move || value.clone())
    }
}

impl ElementValue for ElementValueReference {
    fn element_id(&self) -> &str {
        &self.id
    }

    fn is_ready(&self) -> bool {
        self.complete
    }

    fn value_kind(&self) -> ValueKind {
        self.kind
    }

    fn read(&self) -> String {
        (self.thunk)()
    }
}

impl fmt::Debug for ElementValueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementValueReference")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("complete", &self.complete)
            .finish_non_exhaustive()
    }
}
