//! Cost breakdown model
//!
//! Result of aggregating a customer's usage over a billing period.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::usage::UsagePeriod;

/// Cost category a warning refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Sms,
    Voice,
    Conversation,
    ExchangeRate,
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostCategory::Sms => write!(f, "sms"),
            CostCategory::Voice => write!(f, "voice"),
            CostCategory::Conversation => write!(f, "conversation"),
            CostCategory::ExchangeRate => write!(f, "exchange_rate"),
        }
    }
}

/// Non-fatal problem encountered while building a breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostWarning {
    pub category: CostCategory,
    pub message: String,
}

impl CostWarning {
    pub fn new(category: CostCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Aggregated usage cost for one customer and period
///
/// All amounts are in `currency` (CAD). `total == subtotal + markup_amount`
/// and `markup_amount == subtotal * markup_percentage / 100`, exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub customer_id: i32,
    pub period: UsagePeriod,
    pub currency: String,
    /// USD to CAD rate every amount was converted with
    pub exchange_rate: Decimal,

    pub sms_count: u64,
    pub sms_segments: u64,
    pub call_count: u64,
    pub call_minutes: u64,
    pub conversation_count: u64,

    pub sms_cost: Decimal,
    pub voice_cost: Decimal,
    pub conversation_cost: Decimal,

    pub subtotal: Decimal,
    pub markup_percentage: Decimal,
    pub markup_amount: Decimal,
    pub total: Decimal,

    #[serde(default)]
    pub warnings: Vec<CostWarning>,
}

impl CostBreakdown {
    /// Zeroed breakdown for `customer_id` over `period`
    pub fn empty(customer_id: i32, period: UsagePeriod, currency: &str, exchange_rate: Decimal) -> Self {
        Self {
            customer_id,
            period,
            currency: currency.to_string(),
            exchange_rate,
            sms_count: 0,
            sms_segments: 0,
            call_count: 0,
            call_minutes: 0,
            conversation_count: 0,
            sms_cost: Decimal::ZERO,
            voice_cost: Decimal::ZERO,
            conversation_cost: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            markup_percentage: Decimal::ZERO,
            markup_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            warnings: Vec::new(),
        }
    }

    /// Fill in subtotal, markup and total from the per-category costs
    pub fn finalize(&mut self, markup_percentage: Decimal) {
        self.subtotal = self.sms_cost + self.voice_cost + self.conversation_cost;
        self.markup_percentage = markup_percentage;
        self.markup_amount = self.subtotal * markup_percentage / Decimal::ONE_HUNDRED;
        self.total = self.subtotal + self.markup_amount;
    }

    /// Whether any category was degraded
    pub fn is_partial(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.category != CostCategory::ExchangeRate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn empty_breakdown() -> CostBreakdown {
        let now = Utc::now();
        CostBreakdown::empty(1, UsagePeriod { start: now, end: now }, "CAD", dec!(1.35))
    }

    #[test]
    fn test_finalize_twenty_percent() {
        let mut breakdown = empty_breakdown();
        breakdown.sms_cost = dec!(40.00);
        breakdown.voice_cost = dec!(35.00);
        breakdown.conversation_cost = dec!(25.00);
        breakdown.finalize(dec!(20));

        assert_eq!(breakdown.subtotal, dec!(100.00));
        assert_eq!(breakdown.markup_amount, dec!(20.00));
        assert_eq!(breakdown.total, dec!(120.00));
    }

    #[test]
    fn test_finalize_invariant_holds_exactly() {
        for pct in [dec!(0), dec!(15), dec!(100)] {
            let mut breakdown = empty_breakdown();
            breakdown.sms_cost = dec!(0.1188);
            breakdown.voice_cost = dec!(3.3333);
            breakdown.conversation_cost = dec!(12.07);
            breakdown.finalize(pct);

            assert_eq!(
                breakdown.total,
                breakdown.subtotal + breakdown.subtotal * pct / dec!(100)
            );
        }
    }

    #[test]
    fn test_is_partial() {
        let mut breakdown = empty_breakdown();
        assert!(!breakdown.is_partial());

        breakdown
            .warnings
            .push(CostWarning::new(CostCategory::ExchangeRate, "using fallback"));
        assert!(!breakdown.is_partial());

        breakdown
            .warnings
            .push(CostWarning::new(CostCategory::Voice, "twilio unavailable"));
        assert!(breakdown.is_partial());
    }
}
