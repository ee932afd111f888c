//! Secure Elements: client-side core for collecting and tokenizing sensitive
//! payment data.
//!
//! The host application never handles plaintext. It places opaque element
//! handles into request bodies, and this crate reads them only while
//! building the outbound request or sealing it for a recipient key.
//!
//! # Components
//!
//! ```text
//! ┌──────────────────┐   ElementValue    ┌───────────────────────┐
//! │ CardNumberElement│──────────────────▶│ json::resolve_refs    │
//! │  (card engine)   │                   │  (substitution)       │
//! └───────┬──────────┘                   └──────────┬────────────┘
//!         │ first 6 digits                          │ resolved JSON
//! ┌───────▼──────────┐                   ┌──────────▼────────────┐
//! │ BinLookupCache   │                   │ jwe::encrypt          │
//! │  (memo + HTTP)   │                   │  ECDH-ES + A256GCM    │
//! └──────────────────┘                   └───────────────────────┘
//! ```
//!
//! - [`jwe`]: ECDH-ES (X25519) + Concat KDF + A256GCM compact JWE
//! - [`json`]: element reference substitution and read-back wrapping
//! - [`card`]: brand rules, masks, Luhn, co-badged network selection
//! - [`bin_lookup`]: memoized, coalescing BIN metadata lookups
//! - [`encrypt_token`](mod@encrypt_token): local token encryption
//! - [`config`]: environment and transport settings
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use secure_elements::{
//!     card::{CardNumberElement, CardNumberOptions},
//!     encrypt_token::{EncryptTokenRequest, EncryptTokenResponse, encrypt_token},
//!     json::RequestNode,
//! };
//!
//! # fn example() -> secure_elements::Result<()> {
//! let card = Arc::new(CardNumberElement::new(CardNumberOptions {
//!     element_id: "card_number".into(),
//!     ..CardNumberOptions::default()
//! }));
//! card.set_text("4242 4242 4242 4242");
//!
//! let body = RequestNode::map()
//!     .with("type", "card")
//!     .with("data", RequestNode::map().with("number", RequestNode::reference(card)));
//!
//! let response = encrypt_token(EncryptTokenRequest::single(
//!     body,
//!     "3p7bfXt9wbTTW2HC7OQ1Nz+DQ8hbeGdNrfx+FG+IK08=",
//!     "key-1",
//! ))?;
//! assert!(matches!(response, EncryptTokenResponse::Single(_)));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and criterion"
)]

pub mod bin_lookup;
pub mod card;
pub mod config;
pub mod element;
pub mod encrypt_token;
pub mod error;
pub mod json;
pub mod jwe;
pub mod redact;

pub use error::{ElementsError, Result};
