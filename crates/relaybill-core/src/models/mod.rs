//! Domain models for RelayBill
//!
//! This module contains all the core domain models used throughout the application.

pub mod breakdown;
pub mod customer;
pub mod exchange;
pub mod sms;
pub mod usage;

pub use breakdown::{CostBreakdown, CostCategory, CostWarning};
pub use customer::Customer;
pub use exchange::{ExchangeRateSnapshot, RateSource, RateState};
pub use sms::SmsEncoding;
pub use usage::{CallRecord, ConversationKind, ConversationRecord, SmsRecord, UsagePeriod};
