//! Cost calculation services for RelayBill
//!
//! This crate holds the billing arithmetic and the platform clients it
//! depends on:
//!
//! - `sms` - GSM-7/UCS-2 detection and carrier segment counting
//! - `voice` - per-started-minute call pricing
//! - `currency` - cached USD to CAD conversion with background refresh
//! - `aggregator` - per-customer cost breakdowns with markup
//! - `clients` - Retell, Twilio and exchange-rate HTTP clients
//!
//! Services are cheap to share behind `Arc` and instrumented with tracing.

pub mod aggregator;
pub mod clients;
pub mod currency;
pub mod sms;
pub mod voice;

pub use aggregator::CostAggregator;
pub use clients::{HttpExchangeRateSource, RetellClient, TwilioClient, UpstreamError};
pub use currency::{spawn_refresh_task, CurrencyConverter};
pub use sms::{SmsAnalysis, SmsSegmentCalculator};
pub use voice::VoiceCostCalculator;

/// Business logic constants
pub mod constants {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Currency every breakdown is reported in
    pub const BILLING_CURRENCY: &str = "CAD";

    /// Toll-free SMS price per segment in USD
    pub const DEFAULT_SMS_RATE_PER_SEGMENT: Decimal = dec!(0.0083);

    /// Voice price per billed minute in USD
    pub const DEFAULT_VOICE_RATE_PER_MINUTE: Decimal = dec!(0.022);

    /// USD to CAD rate used until a live rate is fetched
    pub const DEFAULT_FALLBACK_RATE: Decimal = dec!(1.35);

    /// Exchange rate cache lifetime in seconds (24 hours)
    pub const DEFAULT_RATE_TTL_SECS: u64 = 86_400;

    /// Delay before retrying a failed exchange rate fetch, in seconds
    pub const FAILED_REFRESH_RETRY_SECS: u64 = 300;
}
