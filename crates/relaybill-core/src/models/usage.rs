//! Usage records
//!
//! Normalized shapes of the records returned by the telephony and
//! conversational-AI platforms, plus the billing period they are queried for.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Inclusive date range a cost breakdown covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UsagePeriod {
    /// Create a period, rejecting ranges whose end precedes their start
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if end < start {
            return Err(AppError::InvalidPeriod(format!(
                "end {} is before start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Check whether an instant falls inside the period
    #[inline]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Start of the period in epoch milliseconds
    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    /// End of the period in epoch milliseconds
    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

/// One outbound or inbound text message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmsRecord {
    /// Carrier message identifier
    pub sid: String,
    /// Message text
    pub body: String,
    pub from: String,
    pub to: String,
    pub sent_at: Option<DateTime<Utc>>,
    /// Segment count as billed by the carrier, if reported
    pub reported_segments: Option<u32>,
    /// Price in USD as billed by the carrier, if reported (may be negative)
    pub price_usd: Option<Decimal>,
}

/// One telephone call leg
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRecord {
    /// Carrier call identifier
    pub sid: String,
    pub from: String,
    pub to: String,
    pub started_at: Option<DateTime<Utc>>,
    /// Call duration in seconds
    pub duration_seconds: i64,
    /// Price in USD as billed by the carrier, if reported (may be negative)
    pub price_usd: Option<Decimal>,
}

/// Kind of conversational-AI session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Voice call handled by an agent
    Call,
    /// Text (SMS) chat handled by an agent
    Chat,
}

/// One conversational-AI session, already priced by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationRecord {
    pub id: String,
    pub agent_id: String,
    pub kind: ConversationKind,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    /// Provider cost in USD
    pub cost_usd: Option<Decimal>,
}

impl ConversationRecord {
    /// Provider cost, zero when the provider did not price the session
    #[inline]
    pub fn cost_or_zero(&self) -> Decimal {
        self.cost_usd.unwrap_or(Decimal::ZERO)
    }
}
