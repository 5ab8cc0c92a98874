//! Remote rate sources.

use std::time::Duration;

use async_trait::async_trait;
use oxrates_common::Currency;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};

/// Default endpoint for the latest rates document.
pub const DEFAULT_API_URL: &str = "https://openexchangerates.org/api/latest.json";

/// What to ask a rate source for.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Currency the returned rates are expressed against.
    pub base: Currency,
    /// Credential passed through to the source unchanged.
    pub app_id: String,
}

impl FetchRequest {
    /// Create a new fetch request.
    pub fn new(base: Currency, app_id: impl Into<String>) -> Self {
        Self {
            base,
            app_id: app_id.into(),
        }
    }
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("base", &self.base)
            .field("app_id", &"<redacted>")
            .finish()
    }
}

/// Trait for sources of raw rates documents.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the raw JSON text of the latest rates document.
    async fn fetch(&self, request: &FetchRequest) -> FxResult<String>;
}

/// Fetches rates documents over HTTP.
pub struct HttpRateSource {
    api_url: String,
    client: Client,
}

impl HttpRateSource {
    /// Create a source for `api_url` with a bounded request timeout.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_url: api_url.into(),
            client,
        })
    }

    /// Get the endpoint URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn fetch(&self, request: &FetchRequest) -> FxResult<String> {
        debug!(url = %self.api_url, base = %request.base, "Fetching rates document");

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("source", request.base.code()),
                ("app_id", request.app_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FxError::Network(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.api_url, status = status.as_u16(), "Rate source rejected request");
            return Err(FxError::HttpStatus {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FxError::Network(format!("Failed to read response body: {}", e.without_url())))
    }
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    response: parking_lot::Mutex<Result<String, String>>,
    requests: parking_lot::Mutex<Vec<FetchRequest>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a mock serving `document`.
    pub fn new(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: parking_lot::Mutex::new(Ok(document.into())),
            requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Serve a different document from now on.
    pub fn set_document(&self, document: impl Into<String>) {
        *self.response.lock() = Ok(document.into());
    }

    /// Fail every fetch from now on.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.response.lock() = Err(message.into());
    }

    /// Number of fetches performed.
    pub fn fetch_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: &FetchRequest) -> FxResult<String> {
        self.requests.lock().push(request.clone());
        self.response.lock().clone().map_err(FxError::Network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_records_requests() {
        let source = MockRateSource::new("test", "{}");
        let request = FetchRequest::new(Currency::usd(), "secret");

        assert_eq!(source.fetch(&request).await.unwrap(), "{}");
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(source.requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_mock_source_failure() {
        let source = MockRateSource::new("test", "{}");
        source.fail_with("connection refused");

        let err = source
            .fetch(&FetchRequest::new(Currency::usd(), "secret"))
            .await
            .unwrap_err();

        assert!(matches!(err, FxError::Network(_)));
        assert!(err.is_data_acquisition());
    }

    #[test]
    fn test_request_debug_hides_credential() {
        let request = FetchRequest::new(Currency::usd(), "secret-token");
        let printed = format!("{:?}", request);

        assert!(printed.contains("USD"));
        assert!(!printed.contains("secret-token"));
    }

    #[test]
    fn test_http_source_construction() {
        let source = HttpRateSource::new(DEFAULT_API_URL, Duration::from_secs(5)).unwrap();
        assert_eq!(source.api_url(), DEFAULT_API_URL);
        assert_eq!(source.name(), "HTTP");
    }
}
