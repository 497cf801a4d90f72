//! Exchange-rate snapshot
//!
//! Point-in-time view of the USD to CAD rate held by the currency converter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Refresh lifecycle of the cached rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateState {
    /// Nothing fetched yet
    #[default]
    Uninitialized,
    /// A refresh is in flight
    Fetching,
    /// A rate (remote or fallback) is cached
    Cached,
}

/// Where the current rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Hardcoded fallback, no successful fetch yet
    #[default]
    Fallback,
    /// Last successful fetch from the exchange-rate source
    Remote,
}

/// Current converter state as exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSnapshot {
    /// USD to CAD multiplier
    pub rate: Decimal,
    pub state: RateState,
    pub source: RateSource,
    /// When the rate was fetched (None for the fallback)
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ExchangeRateSnapshot {
    pub fn fallback(rate: Decimal) -> Self {
        Self {
            rate,
            state: RateState::Uninitialized,
            source: RateSource::Fallback,
            fetched_at: None,
        }
    }

    #[inline]
    pub fn is_fallback(&self) -> bool {
        self.source == RateSource::Fallback
    }
}
