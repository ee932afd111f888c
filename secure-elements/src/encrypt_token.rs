//! Local token encryption.
//!
//! Resolves the element references in one or more token requests and seals
//! each request's `data` as a JWE for the configured recipient, so the
//! plaintext never leaves the process unencrypted.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    config::EncryptionKeyConfig,
    error::{ElementsError, Result},
    json::{RequestNode, resolve_references},
    jwe,
};

/// One request or a named set of requests.
#[derive(Debug, Clone)]
pub enum TokenRequests {
    /// A single map with `type` and `data`.
    Single(RequestNode),
    /// Requests keyed by caller-chosen name.
    Multiple(BTreeMap<String, RequestNode>),
}

/// Input to [`encrypt_token`].
#[derive(Debug, Clone)]
pub struct EncryptTokenRequest {
    /// The token requests.
    pub token_requests: TokenRequests,
    /// Recipient X25519 public key, PEM or base64.
    pub public_key: String,
    /// Recipient key id.
    pub key_id: String,
}

impl EncryptTokenRequest {
    /// Builds a single-request input.
    #[must_use]
    pub fn single(
        request: RequestNode,
        public_key: impl Into<String>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            token_requests: TokenRequests::Single(request),
            public_key: public_key.into(),
            key_id: key_id.into(),
        }
    }

    /// Builds a multi-request input.
    #[must_use]
    pub fn multiple(
        requests: BTreeMap<String, RequestNode>,
        public_key: impl Into<String>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            token_requests: TokenRequests::Multiple(requests),
            public_key: public_key.into(),
            key_id: key_id.into(),
        }
    }

    /// Builds a single-request input for the configured recipient.
    #[must_use]
    pub fn single_for(request: RequestNode, key: &EncryptionKeyConfig) -> Self {
        Self::single(request, key.public_key.clone(), key.key_id.clone())
    }
}

/// One sealed token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptedToken {
    /// JWE compact serialization of the request's `data`.
    pub encrypted: String,
    /// The request's `type`.
    #[serde(rename = "type")]
    pub token_type: String,
}

/// Output of [`encrypt_token`], shaped like the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EncryptTokenResponse {
    /// Result for [`TokenRequests::Single`].
    Single(EncryptedToken),
    /// Results for [`TokenRequests::Multiple`], by the same names.
    Multiple(BTreeMap<String, EncryptedToken>),
}

/// Resolves and encrypts the token requests.
///
/// All requests are resolved before any is encrypted, so an unready element
/// anywhere fails the whole call without producing output.
///
/// # Errors
///
/// - [`ElementsError::InvalidInput`] if a request is not a map, lacks a
///   string `type` or a `data` member, or an element is not ready
/// - Any error of [`jwe::encrypt`]
#[instrument(skip(request), fields(key_id = %request.key_id))]
pub fn encrypt_token(request: EncryptTokenRequest) -> Result<EncryptTokenResponse> {
    let EncryptTokenRequest { token_requests, public_key, key_id } = request;

    match token_requests {
        TokenRequests::Single(mut node) => {
            resolve_references(&mut node)?;
            let token = seal(node, &public_key, &key_id)?;
            Ok(EncryptTokenResponse::Single(token))
        }
        TokenRequests::Multiple(nodes) => {
            let mut resolved = Vec::with_capacity(nodes.len());
            for (name, mut node) in nodes {
                resolve_references(&mut node)?;
                resolved.push((name, node));
            }

            let mut out = BTreeMap::new();
            for (name, node) in resolved {
                let token = seal(node, &public_key, &key_id)
                    .map_err(|e| rename_input_error(e, &name))?;
                out.insert(name, token);
            }
            debug!(count = out.len(), "token requests encrypted");
            Ok(EncryptTokenResponse::Multiple(out))
        }
    }
}

fn seal(node: RequestNode, public_key: &str, key_id: &str) -> Result<EncryptedToken> {
    let RequestNode::Map(mut entries) = node else {
        return Err(ElementsError::InvalidInput("token request must be an object".to_owned()));
    };

    let token_type = match entries.remove("type") {
        Some(RequestNode::Scalar(serde_json::Value::String(t))) if !t.is_empty() => t,
        _ => return Err(ElementsError::InvalidInput("token request needs a string type".to_owned())),
    };
    let data = entries
        .remove("data")
        .ok_or_else(|| ElementsError::InvalidInput("token request needs data".to_owned()))?;

    let payload = serde_json::to_vec(&data.into_json()?)?;
    let encrypted = jwe::encrypt(&payload, public_key, key_id)?;
    Ok(EncryptedToken { encrypted, token_type })
}

fn rename_input_error(error: ElementsError, name: &str) -> ElementsError {
    match error {
        ElementsError::InvalidInput(msg) => ElementsError::InvalidInput(format!("{name}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::element::{ElementValueReference, ValueKind};

    const KEY: &str = "3p7bfXt9wbTTW2HC7OQ1Nz+DQ8hbeGdNrfx+FG+IK08=";

    fn card_request() -> RequestNode {
        let number = Arc::new(ElementValueReference::from_value(
            "card_number",
            ValueKind::String,
            "4242424242424242",
        ));
        RequestNode::map()
            .with("type", "card")
            .with("data", RequestNode::map().with("number", RequestNode::reference(number)))
    }

    #[test]
    fn test_single() {
        let response =
            encrypt_token(EncryptTokenRequest::single(card_request(), KEY, "key-1")).unwrap();
        let EncryptTokenResponse::Single(token) = response else {
            panic!("expected single response");
        };
        assert_eq!(token.token_type, "card");
        assert_eq!(token.encrypted.split('.').count(), 5);
        assert!(!token.encrypted.contains("4242424242424242"));
    }

    #[test]
    fn test_multiple() {
        let mut requests = BTreeMap::new();
        requests.insert("card".to_owned(), card_request());
        requests.insert(
            "note".to_owned(),
            RequestNode::from(json!({"type": "token", "data": "hello"})),
        );

        let response =
            encrypt_token(EncryptTokenRequest::multiple(requests, KEY, "key-1")).unwrap();
        let EncryptTokenResponse::Multiple(tokens) = response else {
            panic!("expected multiple response");
        };
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["note"].token_type, "token");
    }

    #[test]
    fn test_missing_type_or_data() {
        let no_type = RequestNode::from(json!({"data": {"a": 1}}));
        let err = encrypt_token(EncryptTokenRequest::single(no_type, KEY, "key-1")).unwrap_err();
        assert!(matches!(err, ElementsError::InvalidInput(_)));

        let no_data = RequestNode::from(json!({"type": "token"}));
        let err = encrypt_token(EncryptTokenRequest::single(no_data, KEY, "key-1")).unwrap_err();
        assert!(matches!(err, ElementsError::InvalidInput(_)));
    }

    #[test]
    fn test_unready_element_fails_before_encryption() {
        let pending = Arc::new(ElementValueReference::new(
            "cvc",
            ValueKind::String,
            false,
            String::new,
        ));
        let request = RequestNode::map()
            .with("type", "card")
            .with("data", RequestNode::map().with("cvc", RequestNode::reference(pending)));
        // an empty key would fail encryption; resolution must fail first
        let err = encrypt_token(EncryptTokenRequest::single(request, "", "key-1")).unwrap_err();
        assert!(matches!(err, ElementsError::InvalidInput(_)));
    }

    #[test]
    fn test_single_for_configured_key() {
        let key = EncryptionKeyConfig { public_key: KEY.to_owned(), key_id: "key-1".to_owned() };
        let request = EncryptTokenRequest::single_for(card_request(), &key);
        assert_eq!(request.key_id, "key-1");
        assert!(matches!(encrypt_token(request), Ok(EncryptTokenResponse::Single(_))));
    }

    #[test]
    fn test_key_errors_propagate() {
        let err = encrypt_token(EncryptTokenRequest::single(card_request(), KEY, "")).unwrap_err();
        assert!(matches!(err, ElementsError::InvalidKeyId));
    }

    #[test]
    fn test_response_serializes_type() {
        let token = EncryptedToken { encrypted: "a.b.c.d.e".into(), token_type: "card".into() };
        let value = serde_json::to_value(EncryptTokenResponse::Single(token)).unwrap();
        assert_eq!(value, json!({"encrypted": "a.b.c.d.e", "type": "card"}));
    }
}
