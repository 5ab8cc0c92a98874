//! oxrates Common Types
//!
//! Shared types used across the oxrates crates: currency codes, currency
//! pairs, monetary amounts and time helpers.

pub mod monetary;
pub mod time;

pub use monetary::*;
pub use time::*;
