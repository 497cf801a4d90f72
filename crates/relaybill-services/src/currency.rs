//! USD to CAD currency converter
//!
//! Conversions are synchronous and always answer from the cached rate. A
//! conversion that finds the cache stale (or never filled) starts a
//! background refresh on the ambient tokio runtime; at most one refresh runs
//! at a time. Until the first successful fetch, the fallback rate is used.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use relaybill_core::{
    models::{ExchangeRateSnapshot, RateSource, RateState},
    traits::ExchangeRateSource,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::constants::{DEFAULT_FALLBACK_RATE, DEFAULT_RATE_TTL_SECS, FAILED_REFRESH_RETRY_SECS};

#[derive(Debug)]
struct CachedRate {
    rate: Decimal,
    state: RateState,
    source: RateSource,
    fetched_at: Option<DateTime<Utc>>,
    /// Earliest instant a conversion should trigger another fetch
    next_refresh: Option<Instant>,
}

impl CachedRate {
    fn snapshot(&self) -> ExchangeRateSnapshot {
        ExchangeRateSnapshot {
            rate: self.rate,
            state: self.state,
            source: self.source,
            fetched_at: self.fetched_at,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.next_refresh.map_or(true, |at| now >= at)
    }
}

struct ConverterInner {
    source: Option<Arc<dyn ExchangeRateSource>>,
    ttl: Duration,
    cached: RwLock<CachedRate>,
    refreshing: AtomicBool,
}

/// Clears the in-flight flag when a refresh ends, including on cancellation
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Shared USD to CAD converter
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct CurrencyConverter {
    inner: Arc<ConverterInner>,
}

impl CurrencyConverter {
    /// Create a converter backed by `source`
    pub fn new(source: Arc<dyn ExchangeRateSource>, fallback_rate: Decimal, ttl: Duration) -> Self {
        Self::build(Some(source), fallback_rate, ttl)
    }

    /// Converter that never fetches and always uses `rate`
    pub fn offline(rate: Decimal) -> Self {
        Self::build(None, rate, Duration::from_secs(DEFAULT_RATE_TTL_SECS))
    }

    fn build(
        source: Option<Arc<dyn ExchangeRateSource>>,
        fallback_rate: Decimal,
        ttl: Duration,
    ) -> Self {
        let fallback_rate = if fallback_rate > Decimal::ZERO {
            fallback_rate
        } else {
            warn!(%fallback_rate, "Non-positive fallback rate, using default");
            DEFAULT_FALLBACK_RATE
        };

        Self {
            inner: Arc::new(ConverterInner {
                source,
                ttl,
                cached: RwLock::new(CachedRate {
                    rate: fallback_rate,
                    state: RateState::Uninitialized,
                    source: RateSource::Fallback,
                    fetched_at: None,
                    next_refresh: None,
                }),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Convert a USD amount to CAD at the current rate
    ///
    /// Never blocks on the network. Schedules a refresh when the cache is stale.
    pub fn convert_usd_to_cad(&self, amount_usd: Decimal) -> Decimal {
        self.refresh_if_stale();
        amount_usd * self.current_rate()
    }

    /// Rate used by conversions right now
    pub fn current_rate(&self) -> Decimal {
        self.inner.cached.read().rate
    }

    pub fn snapshot(&self) -> ExchangeRateSnapshot {
        self.inner.cached.read().snapshot()
    }

    /// Whether the converter fetches live rates
    pub fn has_source(&self) -> bool {
        self.inner.source.is_some()
    }

    /// Whether a refresh is currently running
    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    /// Start a background refresh if the cache is stale
    ///
    /// Returns true when a refresh was spawned. Outside a tokio runtime,
    /// or without a source, nothing is spawned.
    pub fn refresh_if_stale(&self) -> bool {
        if self.inner.source.is_none() || self.is_refreshing() {
            return false;
        }
        if !self.inner.cached.read().is_stale(Instant::now()) {
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, skipping exchange rate refresh");
            return false;
        };

        let converter = self.clone();
        handle.spawn(async move {
            if let Err(e) = converter.refresh().await {
                debug!(error = %e, "Background exchange rate refresh failed");
            }
        });
        true
    }

    /// Fetch the rate now and update the cache
    ///
    /// When another refresh is already running, returns the current
    /// snapshot without fetching. On failure the previous rate is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> AppResult<ExchangeRateSnapshot> {
        let Some(source) = self.inner.source.clone() else {
            return Err(AppError::Config(
                "No exchange rate source configured".to_string(),
            ));
        };

        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Exchange rate refresh already in flight");
            return Ok(self.snapshot());
        }
        let _guard = RefreshGuard(&self.inner.refreshing);

        self.inner.cached.write().state = RateState::Fetching;

        let result = source.fetch_usd_to_cad().await.and_then(|rate| {
            if rate > Decimal::ZERO {
                Ok(rate)
            } else {
                Err(AppError::Upstream {
                    service: "exchange-rate".to_string(),
                    message: format!("non-positive rate {}", rate),
                })
            }
        });

        let mut cached = self.inner.cached.write();
        cached.state = RateState::Cached;

        match result {
            Ok(rate) => {
                info!(%rate, "Exchange rate refreshed");
                cached.rate = rate;
                cached.source = RateSource::Remote;
                cached.fetched_at = Some(Utc::now());
                cached.next_refresh = Some(Instant::now() + self.inner.ttl);
                Ok(cached.snapshot())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    rate = %cached.rate,
                    source = ?cached.source,
                    "Exchange rate refresh failed, keeping current rate"
                );
                let retry = self.inner.ttl.min(Duration::from_secs(FAILED_REFRESH_RETRY_SECS));
                cached.next_refresh = Some(Instant::now() + retry);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for CurrencyConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrencyConverter")
            .field("snapshot", &self.snapshot())
            .field("ttl", &self.inner.ttl)
            .field("has_source", &self.inner.source.is_some())
            .finish()
    }
}

/// Refresh the converter every `period` on the current tokio runtime
///
/// The first refresh happens immediately. Periods under one second are
/// raised to one second.
pub fn spawn_refresh_task(converter: CurrencyConverter, period: Duration) -> JoinHandle<()> {
    let period = period.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = converter.refresh().await {
                warn!(error = %e, "Scheduled exchange rate refresh failed");
            }
        }
    })
}
