//! Staleness policy for loaded rates.

use std::time::Duration;

use oxrates_common::{saturating_add, Timestamp};

/// Decide whether rates stamped `last_updated_at` must be refreshed at `now`.
///
/// Without a `max_age` loaded rates never go stale. Rates that were never
/// loaded are always stale.
pub fn is_stale(last_updated_at: Option<Timestamp>, max_age: Option<Duration>, now: Timestamp) -> bool {
    let Some(max_age) = max_age else {
        return false;
    };
    match last_updated_at {
        None => true,
        Some(updated) => saturating_add(updated, max_age) < now,
    }
}
