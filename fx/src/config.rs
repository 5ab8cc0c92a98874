//! Rate store configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use oxrates_common::Currency;

use crate::error::{FxError, FxResult};
use crate::provider::DEFAULT_API_URL;

/// Immutable configuration for a [`crate::RatesStore`].
#[derive(Clone)]
pub struct RatesConfig {
    /// Credential for the remote source. Remote refresh is disabled without it.
    pub app_id: Option<String>,
    /// Base currency every fetched rate is expressed against.
    pub source: Currency,
    /// Where the last fetched document is persisted.
    pub cache_path: Option<PathBuf>,
    /// How old loaded rates may get before a refresh. `None` means never.
    pub max_age: Option<Duration>,
    /// Remote endpoint.
    pub api_url: String,
    /// Bound on a single remote request.
    pub request_timeout: Duration,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            source: Currency::usd(),
            cache_path: None,
            max_age: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for RatesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatesConfig")
            .field("app_id", &self.app_id.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .field("cache_path", &self.cache_path)
            .field("max_age", &self.max_age)
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl RatesConfig {
    /// Set the remote credential.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Set the base currency.
    pub fn with_source(mut self, source: impl Into<Currency>) -> Self {
        self.source = source.into();
        self
    }

    /// Persist fetched documents at `path`.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Refresh loaded rates once they are older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Use a different remote endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Bound remote requests by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(app_id) = std::env::var("OXR_APP_ID") {
            config.app_id = Some(app_id);
        }

        if let Ok(source) = std::env::var("OXR_SOURCE") {
            config.source = Currency::new(source);
        }

        if let Ok(path) = std::env::var("OXR_CACHE_PATH") {
            config.cache_path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("OXR_MAX_AGE_SECS") {
            if let Ok(secs) = secs.parse() {
                config.max_age = Some(Duration::from_secs(secs));
            }
        }

        if let Ok(url) = std::env::var("OXR_API_URL") {
            config.api_url = url;
        }

        if let Ok(secs) = std::env::var("OXR_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> FxResult<()> {
        if self.source.code().is_empty() {
            return Err(FxError::Configuration("Base currency cannot be empty".to_string()));
        }

        if matches!(self.app_id.as_deref(), Some("")) {
            return Err(FxError::Configuration("App id cannot be empty".to_string()));
        }

        if self.api_url.is_empty() {
            return Err(FxError::Configuration("API URL cannot be empty".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(FxError::Configuration("Request timeout cannot be 0".to_string()));
        }

        if matches!(self.cache_path.as_ref(), Some(p) if p.as_os_str().is_empty()) {
            return Err(FxError::Configuration("Cache path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Whether remote refresh is enabled.
    pub fn has_remote(&self) -> bool {
        self.app_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RatesConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.source, Currency::usd());
        assert!(config.max_age.is_none());
        assert!(!config.has_remote());
    }

    #[test]
    fn test_invalid_config() {
        let config = RatesConfig::default().with_app_id("");
        assert!(config.validate().is_err());

        let config = RatesConfig::default().with_source("");
        assert!(config.validate().is_err());

        let config = RatesConfig::default().with_request_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_app_id() {
        let config = RatesConfig::default().with_app_id("very-secret");
        let printed = format!("{:?}", config);

        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("very-secret"));
    }
}
