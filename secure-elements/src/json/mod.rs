//! Element reference substitution over JSON-shaped bodies.
//!
//! Outbound: build a [`RequestNode`] tree with [`RequestNode::Reference`]
//! leaves and call [`resolve_references`] right before serialization.
//!
//! Inbound: [`wrap_for_traversal`] turns a decoded response into a
//! [`LazyJson`] tree whose leaves are read only on demand.

mod lazy;
mod request;

pub use self::{
    lazy::{LazyJson, wrap_for_traversal, wrap_raw, wrap_strings_only},
    request::{RequestNode, coerce, resolve_references},
};
