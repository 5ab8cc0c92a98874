//! oxrates FX store
//!
//! Exchange rate store anchored at a single base currency.
//!
//! # Features
//!
//! - Lazy loading from a cache file and from a remote JSON source
//! - Optional maximum age after which rates are refetched
//! - Exact decimal rates, parsed without going through floating point
//! - Inverse and triangulated rates derived on demand and memoized
//!
//! # Example
//!
//! ```rust,ignore
//! use oxrates_fx::{RatesConfig, RatesStore};
//! use oxrates_common::Currency;
//!
//! let config = RatesConfig::default()
//!     .with_app_id("my-app-id")
//!     .with_cache_path("/var/cache/oxrates/latest.json");
//! let store = RatesStore::new(config)?;
//!
//! // EUR -> GBP is derived through USD
//! let rate = store.get_rate(&Currency::eur(), &Currency::gbp()).await?;
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod loader;
pub mod provider;
pub mod staleness;
pub mod table;

pub use cache::{DocumentCache, FileCache};
pub use config::RatesConfig;
pub use document::RatesDocument;
pub use engine::RatesStore;
pub use error::{FxError, FxResult};
pub use loader::{LoadOrigin, Loader};
pub use provider::{FetchRequest, HttpRateSource, RateSource, DEFAULT_API_URL};
pub use staleness::is_stale;
pub use table::{ExclusiveRates, RateTable};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
