//! Client configuration.
//!
//! The API base URL is resolved once from an explicit `base_path` or a named
//! [`Environment`]: an explicit base path always wins, whichever was set
//! first.
//!
//! # Examples
//!
//! ```toml
//! api_key = "key_test_123"
//! environment = "test"
//!
//! [bin_lookup]
//! timeout_secs = 10
//! cache_capacity = 256
//!
//! [encryption]
//! public_key = "3p7bfXt9wbTTW2HC7OQ1Nz+DQ8hbeGdNrfx+FG+IK08="
//! key_id = "key-1"
//! ```

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ElementsError, Result};

/// Base URL used when neither a base path nor an environment is set.
pub const DEFAULT_BASE_URL: &str = "https://api.basistheory.com";

/// Named API environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test tenant API.
    Test,
    /// US production.
    Us,
    /// EU production.
    Eu,
}

impl Environment {
    /// API base URL for the environment.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Test => "https://api.test.basistheory.com",
            Self::Us | Self::Eu => DEFAULT_BASE_URL,
        }
    }
}

/// BIN lookup transport and memo settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinLookupConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum number of BINs memoized.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for BinLookupConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl BinLookupConfig {
    /// Validates bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::Config`] if:
    /// - `timeout_secs` is not 1-300
    /// - `connect_timeout_secs` is not 1-60
    /// - `cache_capacity` is 0
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ElementsError::Config("timeout_secs must be between 1 and 300".to_owned()));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 60 {
            return Err(ElementsError::Config(
                "connect_timeout_secs must be between 1 and 60".to_owned(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ElementsError::Config("cache_capacity must be at least 1".to_owned()));
        }
        Ok(())
    }

    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Recipient key for local token encryption.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKeyConfig {
    /// X25519 public key, PEM or base64.
    pub public_key: String,
    /// Key identifier sent as the JWE `kid`.
    pub key_id: String,
}

impl fmt::Debug for EncryptionKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeyConfig").field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

/// Top-level configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ElementsConfig {
    /// Public API key sent as `BT-API-KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Named environment; ignored when `base_path` is set.
    #[serde(default)]
    pub environment: Option<Environment>,

    /// Explicit API base URL.
    #[serde(default)]
    pub base_path: Option<String>,

    /// BIN lookup settings.
    #[serde(default)]
    pub bin_lookup: BinLookupConfig,

    /// Default recipient key for local encryption.
    #[serde(default)]
    pub encryption: Option<EncryptionKeyConfig>,
}

impl fmt::Debug for ElementsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("environment", &self.environment)
            .field("base_path", &self.base_path)
            .field("bin_lookup", &self.bin_lookup)
            .field("encryption", &self.encryption)
            .finish()
    }
}

impl ElementsConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::Config`] if the document does not parse or
    /// fails [`validate`](Self::validate).
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| ElementsError::Config(e.message().to_owned()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the environment. Has no effect on [`base_url`](Self::base_url)
    /// while an explicit base path is set.
    #[must_use]
    pub const fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Sets an explicit base path.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Resolved API base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let url = match (&self.base_path, self.environment) {
            (Some(path), _) => path.as_str(),
            (None, Some(environment)) => environment.base_url(),
            (None, None) => DEFAULT_BASE_URL,
        };
        url.trim_end_matches('/').to_owned()
    }

    /// Validates the base URL and BIN lookup settings.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::Config`] if the base URL is malformed, not
    /// HTTPS, or points at localhost, or if [`BinLookupConfig::validate`] fails.
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url();
        let url = Url::parse(&base)
            .map_err(|e| ElementsError::Config(format!("invalid base path {base:?}: {e}")))?;
        validate_url(&url)?;
        if let Some(encryption) = &self.encryption
            && encryption.key_id.is_empty()
        {
            return Err(ElementsError::Config("encryption.key_id must not be empty".to_owned()));
        }
        self.bin_lookup.validate()
    }
}

/// Ensures the URL uses HTTPS and does not point to localhost.
pub(crate) fn validate_url(url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        return Err(ElementsError::Config("Only HTTPS base paths are allowed".to_owned()));
    }

    match url.host_str() {
        None => Err(ElementsError::Config("base path has no host".to_owned())),
        Some("localhost" | "127.0.0.1" | "::1" | "[::1]") => {
            Err(ElementsError::Config("Localhost base paths are not allowed".to_owned()))
        }
        Some(_) => Ok(()),
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_cache_capacity() -> usize {
    crate::bin_lookup::DEFAULT_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        assert_eq!(ElementsConfig::default().base_url(), "https://api.basistheory.com");
    }

    #[test]
    fn test_environment_urls() {
        let test = ElementsConfig::default().with_environment(Environment::Test);
        assert_eq!(test.base_url(), "https://api.test.basistheory.com");
        let eu = ElementsConfig::default().with_environment(Environment::Eu);
        assert_eq!(eu.base_url(), "https://api.basistheory.com");
    }

    #[test]
    fn test_explicit_base_path_wins_in_either_order() {
        let path_first = ElementsConfig::default()
            .with_base_path("https://custom.example.com/")
            .with_environment(Environment::Test);
        let env_first = ElementsConfig::default()
            .with_environment(Environment::Test)
            .with_base_path("https://custom.example.com/");
        assert_eq!(path_first.base_url(), "https://custom.example.com");
        assert_eq!(env_first.base_url(), "https://custom.example.com");
    }

    #[test]
    fn test_from_toml() {
        let config = ElementsConfig::from_toml_str(
            r#"
            api_key = "key_test_123"
            environment = "test"

            [bin_lookup]
            timeout_secs = 5

            [encryption]
            public_key = "abc"
            key_id = "kid"
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, Some(Environment::Test));
        assert_eq!(config.bin_lookup.timeout_secs, 5);
        assert_eq!(config.bin_lookup.connect_timeout_secs, 10);
        assert_eq!(config.bin_lookup.cache_capacity, 1024);
        assert_eq!(config.encryption.as_ref().map(|e| e.key_id.as_str()), Some("kid"));
    }

    #[test]
    fn test_rejects_http_and_localhost() {
        let http = ElementsConfig::default().with_base_path("http://api.example.com");
        assert!(matches!(http.validate(), Err(ElementsError::Config(_))));
        let local = ElementsConfig::default().with_base_path("https://localhost:8443");
        assert!(matches!(local.validate(), Err(ElementsError::Config(_))));
        let junk = ElementsConfig::default().with_base_path("not a url");
        assert!(matches!(junk.validate(), Err(ElementsError::Config(_))));
    }

    #[test]
    fn test_bin_lookup_bounds() {
        let mut config = BinLookupConfig::default();
        assert!(config.validate().is_ok());
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.timeout_secs = 30;
        config.connect_timeout_secs = 61;
        assert!(config.validate().is_err());
        config.connect_timeout_secs = 10;
        config.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ElementsConfig::from_toml_str("environment = \"mars\""),
            Err(ElementsError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ElementsConfig::default().with_api_key("key_secret");
        assert!(!format!("{config:?}").contains("key_secret"));
    }
}
