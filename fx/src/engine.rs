//! Rate store: query-time resolution on top of the loader and table.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use oxrates_common::{Currency, CurrencyPair, Money, Timestamp};
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::cache::FileCache;
use crate::config::RatesConfig;
use crate::error::{FxError, FxResult};
use crate::loader::Loader;
use crate::provider::{HttpRateSource, RateSource};
use crate::table::{ExclusiveRates, RateTable};

// Triangulation goes through the base exactly once; both legs are then
// base-anchored and resolve without recursing further.
const MAX_TRIANGULATION_DEPTH: u8 = 1;

/// Exchange rate store anchored at a single base currency.
///
/// Rates for pairs missing from the loaded document are derived on demand,
/// by inverting a stored rate or by triangulating through the base currency,
/// and memoized in the table so later queries are plain lookups.
pub struct RatesStore {
    config: RatesConfig,
    table: RateTable,
    loader: Loader,
}

impl RatesStore {
    /// Create a store, fetching over HTTP when an app id is configured.
    pub fn new(config: RatesConfig) -> FxResult<Self> {
        config.validate()?;
        let source = HttpRateSource::new(config.api_url.clone(), config.request_timeout)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Create a store that refreshes from `source` when an app id is configured.
    pub fn with_source(config: RatesConfig, source: Arc<dyn RateSource>) -> FxResult<Self> {
        config.validate()?;

        let mut loader = Loader::new(config.source.clone(), config.max_age);
        if let Some(path) = &config.cache_path {
            loader = loader.with_cache(Arc::new(FileCache::new(path.clone())));
        }
        if let Some(app_id) = &config.app_id {
            loader = loader.with_remote(source, app_id.clone());
        }

        Ok(Self {
            config,
            table: RateTable::new(),
            loader,
        })
    }

    /// Get the rate for one unit of `from` in `to`.
    ///
    /// Loads or refreshes data first when needed. Fails with
    /// [`FxError::UnsupportedCurrency`] when either side cannot be related to
    /// the base currency.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn get_rate(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        self.loader.ensure_fresh(&self.table).await?;
        self.resolve(from, to)
    }

    /// Get the rate for a currency pair.
    pub async fn get_pair_rate(&self, pair: &CurrencyPair) -> FxResult<Decimal> {
        self.get_rate(&pair.base, &pair.quote).await
    }

    /// Convert an amount into `to`. No rounding is applied.
    #[instrument(skip(self), fields(amount = %amount, to = %to))]
    pub async fn convert(&self, amount: &Money, to: &Currency) -> FxResult<Money> {
        let rate = self.get_rate(&amount.currency, to).await?;
        amount.exchange(rate, to.clone()).ok_or_else(|| {
            warn!(amount = %amount, rate = %rate, "Conversion overflowed");
            FxError::UnsupportedCurrency(to.clone())
        })
    }

    fn resolve(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        if let Some(rate) = self.table.get(from, to) {
            debug!(from = %from, to = %to, "Rate hit");
            return Ok(rate);
        }

        // Derive and memoize against one document; a concurrent reset waits.
        self.table
            .exclusive(|rates| derive(rates, &self.config.source, from, to, 0))
    }

    /// Make sure rates are loaded and fresh.
    pub async fn load(&self) -> FxResult<()> {
        self.loader.ensure_fresh(&self.table).await
    }

    /// Fetch from the remote source regardless of staleness.
    #[instrument(skip(self))]
    pub async fn load_from_source(&self) -> FxResult<()> {
        self.loader.refresh(&self.table).await
    }

    /// Reload the cache file. Returns `false` if there is no cache file yet.
    #[instrument(skip(self))]
    pub async fn load_from_cache(&self) -> FxResult<bool> {
        self.loader.reload_cache(&self.table).await
    }

    /// Replace all rates with those from a rates document.
    pub async fn load_document(&self, text: &str) -> FxResult<()> {
        self.loader.load_text(&self.table, text).await
    }

    /// Store a rate directly. It is kept until the next reload.
    pub fn add_rate(&self, from: &Currency, to: &Currency, rate: Decimal) {
        self.table.put(from, to, rate);
    }

    /// Every stored rate, loaded or derived, sorted by pair.
    pub fn rates(&self) -> Vec<(CurrencyPair, Decimal)> {
        self.table.snapshot()
    }

    /// Whether any rate is stored.
    pub fn is_loaded(&self) -> bool {
        !self.table.is_empty()
    }

    /// Whether the stored rates are older than the configured maximum age.
    pub fn is_stale(&self) -> bool {
        self.loader.is_stale(&self.table)
    }

    /// Publication time of the loaded document.
    pub fn last_updated_at(&self) -> Option<Timestamp> {
        self.table.last_updated_at()
    }

    /// The configured app id.
    pub fn app_id(&self) -> Option<&str> {
        self.config.app_id.as_deref()
    }

    /// The base currency.
    pub fn source(&self) -> &Currency {
        &self.config.source
    }

    /// The configured cache file.
    pub fn cache_path(&self) -> Option<&Path> {
        self.config.cache_path.as_deref()
    }

    /// The configured staleness limit.
    pub fn max_age(&self) -> Option<Duration> {
        self.config.max_age
    }

    /// The store configuration.
    pub fn config(&self) -> &RatesConfig {
        &self.config
    }
}

fn derive(
    rates: &mut ExclusiveRates<'_>,
    base: &Currency,
    from: &Currency,
    to: &Currency,
    depth: u8,
) -> FxResult<Decimal> {
    if let Some(rate) = rates.get(from, to) {
        return Ok(rate);
    }

    // The base currency's own rates are authoritative
    if from == base {
        return Err(FxError::UnsupportedCurrency(to.clone()));
    }

    if let Some(inverse) = rates.get(to, from) {
        let rate = Decimal::ONE.checked_div(inverse).ok_or_else(|| {
            warn!(from = %from, to = %to, inverse = %inverse, "Cannot invert rate");
            FxError::UnsupportedCurrency(from.clone())
        })?;
        debug!(from = %from, to = %to, rate = %rate, "Derived rate by inversion");
        rates.put(from, to, rate);
        return Ok(rate);
    }

    if to == base {
        return Err(FxError::UnsupportedCurrency(from.clone()));
    }

    if depth >= MAX_TRIANGULATION_DEPTH {
        warn!(from = %from, to = %to, depth, "Triangulation depth exceeded");
        return Err(FxError::UnsupportedCurrency(from.clone()));
    }

    let into_base = derive(rates, base, from, base, depth + 1)?;
    let out_of_base = derive(rates, base, base, to, depth + 1)?;
    let rate = into_base.checked_mul(out_of_base).ok_or_else(|| {
        warn!(from = %from, to = %to, "Triangulated rate overflowed");
        FxError::UnsupportedCurrency(to.clone())
    })?;

    debug!(from = %from, to = %to, via = %base, rate = %rate, "Derived rate by triangulation");
    rates.put(from, to, rate);
    Ok(rate)
}
