//! In-memory rate table.

use std::collections::HashMap;

use oxrates_common::{Currency, CurrencyPair, Timestamp};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

#[derive(Debug, Default)]
struct TableState {
    // from -> to -> rate. Inner maps are never empty.
    rates: HashMap<Currency, HashMap<Currency, Decimal>>,
    last_updated_at: Option<Timestamp>,
}

impl TableState {
    fn get(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        self.rates.get(from).and_then(|quotes| quotes.get(to)).copied()
    }

    fn put(&mut self, from: &Currency, to: &Currency, rate: Decimal) {
        self.rates
            .entry(from.clone())
            .or_default()
            .insert(to.clone(), rate);
    }
}

/// Exclusive view of a [`RateTable`] handed out by [`RateTable::exclusive`].
///
/// No reset can happen while it is alive, so every rate read through it and
/// every rate written through it belong to the same loaded document.
pub struct ExclusiveRates<'a> {
    state: &'a mut TableState,
}

impl ExclusiveRates<'_> {
    /// Exact lookup, no derivation.
    pub fn get(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        self.state.get(from, to)
    }

    /// Insert or overwrite one pair.
    pub fn put(&mut self, from: &Currency, to: &Currency, rate: Decimal) {
        self.state.put(from, to, rate);
    }
}

/// Thread-safe table of directed currency pair rates.
///
/// The reverse of a stored pair is never added implicitly. Readers share the
/// lock; [`RateTable::put`] and [`RateTable::reset`] take it exclusively.
#[derive(Debug, Default)]
pub struct RateTable {
    state: RwLock<TableState>,
}

impl RateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if no pairs are stored.
    pub fn is_empty(&self) -> bool {
        self.state.read().rates.is_empty()
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.state.read().rates.values().map(HashMap::len).sum()
    }

    /// Exact lookup, no derivation.
    pub fn get(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        self.state.read().get(from, to)
    }

    /// Insert or overwrite one pair.
    pub fn put(&self, from: &Currency, to: &Currency, rate: Decimal) {
        self.state.write().put(from, to, rate);
    }

    /// Run `f` holding the table exclusively.
    ///
    /// Lookups and inserts made through the view cannot straddle a
    /// [`RateTable::reset`].
    pub fn exclusive<R>(&self, f: impl FnOnce(&mut ExclusiveRates<'_>) -> R) -> R {
        let mut state = self.state.write();
        f(&mut ExclusiveRates { state: &mut state })
    }

    /// Replace the whole table with `base -> currency` entries and stamp it.
    ///
    /// The replacement map is built before the lock is taken, so readers see
    /// either the previous contents or the new ones, never a mix.
    pub fn reset<I>(&self, base: &Currency, entries: I, timestamp: Timestamp)
    where
        I: IntoIterator<Item = (Currency, Decimal)>,
    {
        let quotes: HashMap<Currency, Decimal> = entries.into_iter().collect();
        let count = quotes.len();

        let mut rates = HashMap::new();
        if !quotes.is_empty() {
            rates.insert(base.clone(), quotes);
        }

        {
            let mut state = self.state.write();
            state.rates = rates;
            state.last_updated_at = Some(timestamp);
        }

        debug!(base = %base, entries = count, timestamp = %timestamp, "Rate table reset");
    }

    /// When the table was last reset.
    pub fn last_updated_at(&self) -> Option<Timestamp> {
        self.state.read().last_updated_at
    }

    /// Copy of every stored pair, sorted by pair.
    pub fn snapshot(&self) -> Vec<(CurrencyPair, Decimal)> {
        let state = self.state.read();
        let mut pairs: Vec<(CurrencyPair, Decimal)> = state
            .rates
            .iter()
            .flat_map(|(from, quotes)| {
                quotes.iter().map(move |(to, rate)| {
                    (CurrencyPair::new(from.clone(), to.clone()), *rate)
                })
            })
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrates_common::from_unix_seconds;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn entries() -> Vec<(Currency, Decimal)> {
        vec![(Currency::eur(), dec!(0.9)), (Currency::gbp(), dec!(0.8))]
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = RateTable::new();

        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.last_updated_at().is_none());
        assert!(table.get(&Currency::usd(), &Currency::eur()).is_none());
    }

    #[test]
    fn test_put_and_get() {
        let table = RateTable::new();
        table.put(&Currency::usd(), &Currency::eur(), dec!(0.9));

        assert!(!table.is_empty());
        assert_eq!(table.get(&Currency::usd(), &Currency::eur()), Some(dec!(0.9)));
        // Reverse pair is not populated
        assert!(table.get(&Currency::eur(), &Currency::usd()).is_none());
        // Put never stamps the table
        assert!(table.last_updated_at().is_none());

        table.put(&Currency::usd(), &Currency::eur(), dec!(0.91));
        assert_eq!(table.get(&Currency::usd(), &Currency::eur()), Some(dec!(0.91)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reset_replaces_everything() {
        let table = RateTable::new();
        table.put(&Currency::eur(), &Currency::jpy(), dec!(160));

        let ts = from_unix_seconds(1_000_000_000).unwrap();
        table.reset(&Currency::usd(), entries(), ts);

        assert_eq!(table.len(), 2);
        assert!(table.get(&Currency::eur(), &Currency::jpy()).is_none());
        assert_eq!(table.get(&Currency::usd(), &Currency::gbp()), Some(dec!(0.8)));
        assert_eq!(table.last_updated_at(), Some(ts));
    }

    #[test]
    fn test_reset_with_no_entries_is_empty_but_stamped() {
        let table = RateTable::new();
        table.put(&Currency::usd(), &Currency::eur(), dec!(0.9));

        let ts = from_unix_seconds(42).unwrap();
        table.reset(&Currency::usd(), Vec::new(), ts);

        assert!(table.is_empty());
        assert_eq!(table.last_updated_at(), Some(ts));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let table = RateTable::new();
        table.reset(&Currency::usd(), entries(), from_unix_seconds(1).unwrap());
        table.put(&Currency::eur(), &Currency::usd(), dec!(1.1));

        let pairs: Vec<String> = table
            .snapshot()
            .into_iter()
            .map(|(pair, _)| pair.to_string())
            .collect();

        assert_eq!(pairs, vec!["EUR/USD", "USD/EUR", "USD/GBP"]);
    }

    #[test]
    fn test_reset_waits_for_exclusive_view() {
        let table = Arc::new(RateTable::new());
        table.reset(
            &Currency::usd(),
            vec![(Currency::eur(), dec!(0.5))],
            from_unix_seconds(1).unwrap(),
        );

        let resetter = table.exclusive(|rates| {
            let before = rates.get(&Currency::usd(), &Currency::eur()).unwrap();

            let (started_tx, started_rx) = std::sync::mpsc::channel();
            let other = table.clone();
            let resetter = std::thread::spawn(move || {
                started_tx.send(()).unwrap();
                other.reset(
                    &Currency::usd(),
                    vec![(Currency::eur(), dec!(0.25))],
                    from_unix_seconds(2).unwrap(),
                );
            });
            started_rx.recv().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(50));

            // The reset is blocked until the view is released
            assert_eq!(rates.get(&Currency::usd(), &Currency::eur()), Some(before));
            rates.put(&Currency::eur(), &Currency::usd(), Decimal::ONE / before);
            resetter
        });
        resetter.join().unwrap();

        // The derived entry belonged to the old document and went with it
        assert!(table.get(&Currency::eur(), &Currency::usd()).is_none());
        assert_eq!(table.get(&Currency::usd(), &Currency::eur()), Some(dec!(0.25)));
        assert_eq!(table.last_updated_at(), from_unix_seconds(2));
    }

    #[test]
    fn test_concurrent_readers_during_reset() {
        let table = Arc::new(RateTable::new());
        table.reset(&Currency::usd(), entries(), from_unix_seconds(1).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if i == 0 {
                            table.reset(&Currency::usd(), entries(), from_unix_seconds(2).unwrap());
                        } else {
                            // A reset never exposes a partially filled table
                            assert_eq!(table.len(), 2);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
