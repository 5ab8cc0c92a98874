//! Loading rates into the table from the cache file or the remote source.

use std::sync::Arc;
use std::time::Duration;

use oxrates_common::{now, Currency};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::DocumentCache;
use crate::document::RatesDocument;
use crate::error::{FxError, FxResult};
use crate::provider::{FetchRequest, RateSource};
use crate::staleness::is_stale;
use crate::table::RateTable;

/// Where a loaded document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// The persisted cache file.
    CacheFile,
    /// The remote source.
    Remote,
    /// Text handed in by the caller.
    Inline,
}

impl std::fmt::Display for LoadOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadOrigin::CacheFile => write!(f, "cache_file"),
            LoadOrigin::Remote => write!(f, "remote"),
            LoadOrigin::Inline => write!(f, "inline"),
        }
    }
}

/// Remote source plus the request it is asked with.
struct Remote {
    source: Arc<dyn RateSource>,
    request: FetchRequest,
}

/// Keeps a [`RateTable`] populated and fresh.
///
/// Every load parses the whole document before the table is touched, so a
/// failed load leaves the last good contents in place.
pub struct Loader {
    base: Currency,
    max_age: Option<Duration>,
    cache: Option<Arc<dyn DocumentCache>>,
    remote: Option<Remote>,
    // Serializes refreshes so concurrent queries do not fetch twice.
    refresh_gate: Mutex<()>,
}

impl Loader {
    /// Create a loader for rates anchored at `base`.
    pub fn new(base: Currency, max_age: Option<Duration>) -> Self {
        Self {
            base,
            max_age,
            cache: None,
            remote: None,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Persist fetched documents to, and read the initial state from, `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn DocumentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Refresh from `source`, authenticating with `app_id`.
    pub fn with_remote(mut self, source: Arc<dyn RateSource>, app_id: impl Into<String>) -> Self {
        self.remote = Some(Remote {
            request: FetchRequest::new(self.base.clone(), app_id),
            source,
        });
        self
    }

    /// The base currency.
    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// The staleness limit.
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Whether a cache is configured.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Whether remote refresh is enabled.
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Whether the table's contents are too old to use.
    pub fn is_stale(&self, table: &RateTable) -> bool {
        is_stale(table.last_updated_at(), self.max_age, now())
    }

    /// Make sure the table holds usable rates.
    ///
    /// An empty table is first seeded from the cache file, whatever its age.
    /// Then, when remote refresh is enabled and the table is still empty or
    /// stale, the remote document is fetched, persisted and loaded.
    pub async fn ensure_fresh(&self, table: &RateTable) -> FxResult<()> {
        let _guard = self.refresh_gate.lock().await;

        if table.is_empty() && self.cache.is_some() {
            self.load_cached(table).await?;
        }

        if self.remote.is_some() && (table.is_empty() || self.is_stale(table)) {
            self.load_remote(table).await?;
        }

        Ok(())
    }

    /// Force a refresh from the remote source.
    pub async fn refresh(&self, table: &RateTable) -> FxResult<()> {
        let _guard = self.refresh_gate.lock().await;
        self.load_remote(table).await
    }

    /// Force a reload from the cache. Returns `false` if nothing was cached.
    pub async fn reload_cache(&self, table: &RateTable) -> FxResult<bool> {
        let _guard = self.refresh_gate.lock().await;
        self.load_cached(table).await
    }

    /// Reset the table from document text supplied by the caller.
    pub async fn load_text(&self, table: &RateTable, text: &str) -> FxResult<()> {
        let _guard = self.refresh_gate.lock().await;
        let document = RatesDocument::parse(text)?;
        self.apply(table, document, LoadOrigin::Inline);
        Ok(())
    }

    async fn load_cached(&self, table: &RateTable) -> FxResult<bool> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| FxError::Configuration("No cache path configured".to_string()))?;

        let Some(text) = cache.read().await? else {
            return Ok(false);
        };

        let document = RatesDocument::parse(&text).map_err(|e| {
            warn!(path = %cache.location().display(), error = %e, "Cached rates document is invalid");
            e
        })?;
        self.apply(table, document, LoadOrigin::CacheFile);
        Ok(true)
    }

    async fn load_remote(&self, table: &RateTable) -> FxResult<()> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| FxError::Configuration("No app id configured".to_string()))?;

        debug!(source = remote.source.name(), base = %self.base, "Refreshing rates");

        let text = remote.source.fetch(&remote.request).await.map_err(|e| {
            warn!(source = remote.source.name(), error = %e, "Rate source fetch failed");
            e
        })?;

        let document = RatesDocument::parse(&text).map_err(|e| {
            warn!(source = remote.source.name(), error = %e, "Fetched rates document is invalid");
            e
        })?;

        if let Some(cache) = &self.cache {
            cache.write(&text).await?;
        }

        self.apply(table, document, LoadOrigin::Remote);
        Ok(())
    }

    fn apply(&self, table: &RateTable, document: RatesDocument, origin: LoadOrigin) {
        let count = document.len();
        let timestamp = document.timestamp;

        table.reset(&self.base, document.rates, timestamp);

        info!(
            origin = %origin,
            base = %self.base,
            rates = count,
            timestamp = %timestamp,
            "Loaded rates"
        );
    }
}
