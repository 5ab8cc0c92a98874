//! Rates document parsing.
//!
//! A rates document looks like
//! `{"timestamp": 1000000000, "rates": {"EUR": 0.9, "GBP": 0.8}}`, every rate
//! being the price of one unit of the base currency. Rate literals are kept
//! as written: `serde_json` runs with `arbitrary_precision`, so each number
//! reaches [`Decimal`] as its source text and never passes through `f64`.

use std::collections::BTreeMap;
use std::str::FromStr;

use oxrates_common::{from_unix_seconds, Currency, Timestamp};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::error::{FxError, FxResult};

#[derive(Debug, Deserialize)]
struct RawDocument {
    timestamp: Number,
    rates: BTreeMap<String, Value>,
}

/// A parsed rates document.
#[derive(Debug, Clone, PartialEq)]
pub struct RatesDocument {
    /// When the source published these rates.
    pub timestamp: Timestamp,
    /// Price of one unit of the base currency, per currency.
    pub rates: BTreeMap<Currency, Decimal>,
}

impl RatesDocument {
    /// Parse a document from its JSON text.
    ///
    /// Fails on the first malformed entry; nothing is skipped or defaulted.
    pub fn parse(text: &str) -> FxResult<Self> {
        let raw: RawDocument = serde_json::from_str(text)
            .map_err(|e| FxError::MalformedDocument(e.to_string()))?;

        let timestamp = raw
            .timestamp
            .as_i64()
            .and_then(from_unix_seconds)
            .ok_or_else(|| FxError::InvalidTimestamp(raw.timestamp.to_string()))?;

        let rates = raw
            .rates
            .into_iter()
            .map(|(code, value)| {
                let currency = Currency::new(code);
                let rate = parse_rate(&currency, &value)?;
                Ok((currency, rate))
            })
            .collect::<FxResult<BTreeMap<_, _>>>()?;

        Ok(Self { timestamp, rates })
    }

    /// Number of rates in the document.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if the document carries no rates.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

fn parse_rate(currency: &Currency, value: &Value) -> FxResult<Decimal> {
    let invalid = || FxError::InvalidRate {
        currency: currency.clone(),
        value: value.to_string(),
    };

    let Value::Number(number) = value else {
        return Err(invalid());
    };

    let literal = number.to_string();
    let rate = if literal.contains(['e', 'E']) {
        Decimal::from_scientific(&literal)
    } else {
        Decimal::from_str_exact(&literal).or_else(|_| Decimal::from_str(&literal))
    }
    .map_err(|_| invalid())?;

    if rate <= Decimal::ZERO {
        return Err(invalid());
    }

    Ok(rate)
}
