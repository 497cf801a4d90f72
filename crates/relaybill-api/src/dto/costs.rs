//! Cost calculation DTOs

use chrono::{DateTime, Datelike, TimeZone, Utc};
use relaybill_core::models::{ExchangeRateSnapshot, SmsEncoding, UsagePeriod};
use relaybill_core::{AppError, AppResult};
use relaybill_services::SmsAnalysis;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// SMS segment count request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SmsSegmentsRequest {
    /// Message body
    #[validate(length(max = 10000, message = "Message body is too long"))]
    pub text: String,
}

/// SMS segment count and price
#[derive(Debug, Clone, Serialize)]
pub struct SmsSegmentsResponse {
    pub encoding: SmsEncoding,
    /// Length in encoding units (characters for GSM-7, UTF-16 units for UCS-2)
    pub length: usize,
    pub segments: u32,
    pub cost_usd: Decimal,
    pub cost_cad: Decimal,
}

impl SmsSegmentsResponse {
    pub fn new(analysis: SmsAnalysis, cost_usd: Decimal, cost_cad: Decimal) -> Self {
        Self {
            encoding: analysis.encoding,
            length: analysis.length,
            segments: analysis.segments,
            cost_usd,
            cost_cad,
        }
    }
}

/// Voice cost query
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceCostQuery {
    pub duration_seconds: i64,
}

/// Voice call price
#[derive(Debug, Clone, Serialize)]
pub struct VoiceCostResponse {
    pub duration_seconds: i64,
    pub billed_minutes: i64,
    pub cost_usd: Decimal,
    pub cost_cad: Decimal,
}

/// Billing period query; defaults to the current month up to now
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl CostQuery {
    /// Resolve the requested period against `now`
    pub fn to_period(&self, now: DateTime<Utc>) -> AppResult<UsagePeriod> {
        let start = match self.start {
            Some(start) => start,
            None => month_start(now)?,
        };
        UsagePeriod::new(start, self.end.unwrap_or(now))
    }
}

fn month_start(now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::Internal("Invalid month start".to_string()))
}

/// Exchange rate status
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRateResponse {
    pub base: &'static str,
    pub target: &'static str,
    #[serde(flatten)]
    pub snapshot: ExchangeRateSnapshot,
    /// Whether a live source is configured
    pub live_source: bool,
    pub refreshing: bool,
}

impl ExchangeRateResponse {
    pub fn new(snapshot: ExchangeRateSnapshot, live_source: bool, refreshing: bool) -> Self {
        Self {
            base: "USD",
            target: "CAD",
            snapshot,
            live_source,
            refreshing,
        }
    }
}
