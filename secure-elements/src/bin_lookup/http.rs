//! HTTP BIN enrichment client.

use std::{fmt, future::Future};

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{BinFetcher, BinInfo};
use crate::{
    config::{ElementsConfig, validate_url},
    error::{ElementsError, Result},
};

/// `User-Agent` sent with enrichment requests.
pub const USER_AGENT: &str = concat!("secure-elements/", env!("CARGO_PKG_VERSION"));

const API_KEY_HEADER: &str = "BT-API-KEY";
const TRACE_ID_HEADER: &str = "BT-TRACE-ID";
const CARD_DETAILS_PATH: &str = "enrichments/card-details";

/// Fetches [`BinInfo`] from `GET {base}/enrichments/card-details?bin=<bin>`.
///
/// One attempt per call; retries are left to the caller.
#[derive(Clone)]
pub struct HttpBinFetcher {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpBinFetcher {
    /// Builds a fetcher from configuration.
    ///
    /// # Errors
    ///
    /// - [`ElementsError::Config`] if the configuration is invalid or has no API key
    /// - [`ElementsError::Http`] if the HTTP client cannot be built
    pub fn from_config(config: &ElementsConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ElementsError::Config("api_key is required for BIN lookup".to_owned()))?;

        let client = Client::builder()
            .timeout(config.bin_lookup.timeout())
            .connect_timeout(config.bin_lookup.connect_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Self::with_client(client, &config.base_url(), api_key)
    }

    /// Builds a fetcher around an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError::Config`] if `base_url` is not a valid HTTPS URL.
    pub fn with_client(client: Client, base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = card_details_url(base_url)?;
        validate_url(&endpoint)?;
        Ok(Self { client, endpoint, api_key: api_key.into() })
    }

    /// The enrichment endpoint, without query.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn request(&self, bin: &str) -> Result<BinInfo> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("bin", bin);
        let trace_id = Uuid::new_v4();

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(TRACE_ID_HEADER, trace_id.to_string())
            .send()
            .await?;

        let status = response.status();
        debug!(%status, %trace_id, "BIN lookup response");
        if status != StatusCode::OK {
            return Err(ElementsError::BinLookup(format!("HTTP error! status: {}", status.as_u16())));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ElementsError::BinLookup(format!("invalid BIN lookup response: {e}")))
    }
}

impl fmt::Debug for HttpBinFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBinFetcher").field("endpoint", &self.endpoint.as_str()).finish_non_exhaustive()
    }
}

/// Appends the card-details path to a base URL, keeping any base path prefix.
fn card_details_url(base_url: &str) -> Result<Url> {
    let joined = format!("{}/{CARD_DETAILS_PATH}", base_url.trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| ElementsError::Config(format!("invalid base path: {e}")))
}

impl BinFetcher for HttpBinFetcher {
    fn fetch<'a>(&'a self, bin: &'a str) -> impl Future<Output = Result<BinInfo>> + Send + 'a {
        self.request(bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_config() {
        let config = ElementsConfig::default()
            .with_api_key("key_test")
            .with_environment(crate::config::Environment::Test);
        let fetcher = HttpBinFetcher::from_config(&config).unwrap();
        assert_eq!(
            fetcher.endpoint().as_str(),
            "https://api.test.basistheory.com/enrichments/card-details"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let url = card_details_url("https://proxy.example.com/bt/").unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.com/bt/enrichments/card-details");
    }

    #[test]
    fn test_api_key_required() {
        let config = ElementsConfig::default();
        assert!(matches!(HttpBinFetcher::from_config(&config), Err(ElementsError::Config(_))));
    }

    #[test]
    fn test_rejects_plain_http() {
        let result = HttpBinFetcher::with_client(Client::new(), "http://api.example.com", "key");
        assert!(matches!(result, Err(ElementsError::Config(_))));
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("secure-elements/"));
    }
}
