//! Error types for secure element processing.
//!
//! Every fallible operation in this crate returns [`ElementsError`]. The
//! variants are deliberately specific so a host application can tell apart
//! "a value was not ready yet", "the encryption key is misconfigured" and
//! "card metadata could not be fetched" without string matching.
//!
//! # Error Categories
//!
//! - **Encryption errors** ([`ElementsError::InvalidPublicKey`], [`ElementsError::InvalidKeyId`],
//!   [`ElementsError::KeyAgreementFailed`], [`ElementsError::EncryptionFailed`]): JWE failures
//! - **Input errors** ([`ElementsError::InvalidInput`]): an element reference was not ready or
//!   could not be coerced, or a token request was malformed
//! - **Registration errors** ([`ElementsError::InvalidMask`], [`ElementsError::InvalidBrandRule`]):
//!   a custom card brand was rejected
//! - **Lookup errors** ([`ElementsError::BinLookup`], [`ElementsError::Http`]): BIN enrichment
//!   transport failures, only ever returned by a fetcher
//!
//! # Examples
//!
//! ```
//! use secure_elements::error::{ElementsError, Result};
//!
//! fn require_key_id(kid: &str) -> Result<&str> {
//!     if kid.is_empty() {
//!         return Err(ElementsError::InvalidKeyId);
//!     }
//!     Ok(kid)
//! }
//!
//! assert!(require_key_id("").unwrap_err().is_crypto());
//! ```

use thiserror::Error;

/// Result type alias for element operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, ElementsError>;

/// Errors that can occur while resolving, encrypting or classifying element values.
///
/// Messages never include element plaintext.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum ElementsError {
    /// The recipient public key could not be used.
    ///
    /// Occurs when the key is empty, is not valid base64 once PEM armor and
    /// whitespace are stripped, or does not decode to a 32-byte X25519 point.
    ///
    /// # Recovery
    ///
    /// Fetch the current client encryption key from the key management API and
    /// pass its PEM or base64 form unmodified.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The key identifier was empty.
    ///
    /// # Recovery
    ///
    /// Pass the `kid` returned alongside the public key.
    #[error("Invalid key id: key id must not be empty")]
    InvalidKeyId,

    /// ECDH key agreement produced an unusable shared secret.
    ///
    /// X25519 never fails outright, but a low-order recipient point yields an
    /// all-zero secret which is rejected here.
    #[error("Key agreement failed: {0}")]
    KeyAgreementFailed(String),

    /// AES-256-GCM encryption failed.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Request input was rejected.
    ///
    /// Raised when an element reference is not ready, when its value does not
    /// parse as the kind it declares, or when a token request is missing its
    /// `type` or `data` member. No partially resolved request is ever returned
    /// alongside this error.
    ///
    /// # Recovery
    ///
    /// Wait for every element to report `complete` before building the request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A card number mask was malformed.
    ///
    /// Every mask element must be a single literal character or a single digit
    /// placeholder.
    #[error("Invalid card mask: {0}")]
    InvalidMask(String),

    /// A card brand rule was malformed (empty id, empty pattern, no lengths,
    /// or an inverted range).
    #[error("Invalid brand rule: {0}")]
    InvalidBrandRule(String),

    /// BIN enrichment returned an unusable response.
    ///
    /// Never surfaced by the card engine; a failed lookup only clears metadata.
    #[error("BIN lookup failed: {0}")]
    BinLookup(String),

    /// HTTP request failed.
    ///
    /// Wraps [`reqwest::Error`] for BIN enrichment transport failures
    /// (timeouts, DNS, TLS, connection refused).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration was rejected by validation.
    ///
    /// # Recovery
    ///
    /// Use an HTTPS base path and timeouts within the documented bounds.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ElementsError {
    /// Returns true for errors raised by the JWE engine.
    #[must_use]
    pub const fn is_crypto(&self) -> bool {
        matches!(
            self,
            Self::InvalidPublicKey(_)
                | Self::InvalidKeyId
                | Self::KeyAgreementFailed(_)
                | Self::EncryptionFailed(_)
        )
    }

    /// Returns true when request input (not configuration) was at fault.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Returns true for BIN enrichment transport failures.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::BinLookup(_) | Self::Http(_))
    }
}
