//! oxrates CLI
//!
//! Looks up exchange rates through the oxrates store.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oxrates_common::{Currency, Money};
use oxrates_fx::{RatesConfig, RatesStore};

/// oxrates CLI
#[derive(Parser, Debug)]
#[command(name = "oxrates")]
#[command(about = "Look up exchange rates anchored at a base currency")]
struct Args {
    /// Currency to convert from
    #[arg(required_unless_present = "list")]
    from: Option<String>,

    /// Currency to convert to
    #[arg(required_unless_present = "list")]
    to: Option<String>,

    /// Amount to convert instead of printing the bare rate
    #[arg(short, long)]
    amount: Option<Decimal>,

    /// Remote source credential (overrides OXR_APP_ID)
    #[arg(long)]
    app_id: Option<String>,

    /// Base currency (overrides OXR_SOURCE)
    #[arg(long)]
    source: Option<String>,

    /// Cache file path (overrides OXR_CACHE_PATH)
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// Maximum age of loaded rates in seconds (overrides OXR_MAX_AGE_SECS)
    #[arg(long)]
    max_age_secs: Option<u64>,

    /// Print every stored rate after loading
    #[arg(long)]
    list: bool,

    /// Log level used when RUST_LOG is unset (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, mut config: RatesConfig) -> RatesConfig {
        if let Some(app_id) = &self.app_id {
            config.app_id = Some(app_id.clone());
        }
        if let Some(source) = &self.source {
            config.source = Currency::new(source.clone());
        }
        if let Some(path) = &self.cache_path {
            config.cache_path = Some(path.clone());
        }
        if let Some(secs) = self.max_age_secs {
            config.max_age = Some(Duration::from_secs(secs));
        }
        config
    }

    fn log_level(&self, env_level: Option<String>) -> String {
        self.log_level
            .clone()
            .or(env_level)
            .unwrap_or_else(|| "info".to_string())
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level(std::env::var("LOG_LEVEL").ok()), args.json_logs);

    // Load configuration
    let config = args.apply(RatesConfig::from_env());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    info!(config = ?config, "Starting oxrates");
    let store = RatesStore::new(config)?;

    if let (Some(from), Some(to)) = (&args.from, &args.to) {
        let from = Currency::new(from.clone());
        let to = Currency::new(to.clone());

        match args.amount {
            Some(value) => {
                let converted = store.convert(&Money::new(value, from), &to).await?;
                println!("{}", converted);
            }
            None => {
                let rate = store.get_rate(&from, &to).await?;
                println!("{}", rate);
            }
        }
    } else {
        store.load().await?;
    }

    if args.list {
        for (pair, rate) in store.rates() {
            println!("{}\t{}", pair, rate);
        }
        if let Some(updated) = store.last_updated_at() {
            info!(last_updated_at = %updated, "Rates listed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "oxrates",
            "EUR",
            "GBP",
            "--app-id",
            "token",
            "--source",
            "CHF",
            "--max-age-secs",
            "600",
        ]);
        let config = args.apply(RatesConfig::default());

        assert_eq!(config.app_id.as_deref(), Some("token"));
        assert_eq!(config.source, Currency::new("CHF"));
        assert_eq!(config.max_age, Some(Duration::from_secs(600)));
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_list_without_pair() {
        let args = Args::parse_from(["oxrates", "--list"]);
        assert!(args.list);
        assert!(args.from.is_none());

        assert!(Args::try_parse_from(["oxrates"]).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let args = Args::parse_from(["oxrates", "--list"]);
        assert_eq!(args.log_level(None), "info");
        assert_eq!(args.log_level(Some("warn".to_string())), "warn");

        let args = Args::parse_from(["oxrates", "--list", "--log-level", "debug"]);
        assert_eq!(args.log_level(Some("warn".to_string())), "debug");
    }

    #[test]
    fn test_amount_is_decimal() {
        let args = Args::parse_from(["oxrates", "USD", "EUR", "--amount", "12.50"]);
        assert_eq!(args.amount.map(|a| a.to_string()), Some("12.50".to_string()));
    }
}
