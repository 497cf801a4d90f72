//! Voice cost calculator
//!
//! Calls are billed per started minute.

use rust_decimal::Decimal;
use tracing::debug;

use crate::constants::DEFAULT_VOICE_RATE_PER_MINUTE;
use crate::currency::CurrencyConverter;

/// Minutes billed for a call of `duration_seconds`, rounded up
///
/// Zero or negative durations bill nothing.
pub fn billed_minutes(duration_seconds: i64) -> i64 {
    if duration_seconds <= 0 {
        return 0;
    }
    (duration_seconds - 1) / 60 + 1
}

/// Per-minute voice pricing
#[derive(Debug, Clone)]
pub struct VoiceCostCalculator {
    rate_per_minute_usd: Decimal,
}

impl Default for VoiceCostCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE_RATE_PER_MINUTE)
    }
}

impl VoiceCostCalculator {
    pub fn new(rate_per_minute_usd: Decimal) -> Self {
        Self {
            rate_per_minute_usd,
        }
    }

    pub fn rate_per_minute_usd(&self) -> Decimal {
        self.rate_per_minute_usd
    }

    /// USD cost of a call of `duration_seconds`
    pub fn cost_usd(&self, duration_seconds: i64) -> Decimal {
        let minutes = billed_minutes(duration_seconds);
        let cost = Decimal::from(minutes) * self.rate_per_minute_usd;
        debug!(duration_seconds, minutes, %cost, "Calculated voice cost");
        cost
    }

    /// CAD cost of a call at the converter's current rate
    pub fn cost_cad(&self, duration_seconds: i64, converter: &CurrencyConverter) -> Decimal {
        converter.convert_usd_to_cad(self.cost_usd(duration_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_billed_minutes_rounds_up() {
        assert_eq!(billed_minutes(0), 0);
        assert_eq!(billed_minutes(-30), 0);
        assert_eq!(billed_minutes(1), 1);
        assert_eq!(billed_minutes(59), 1);
        assert_eq!(billed_minutes(60), 1);
        assert_eq!(billed_minutes(61), 2);
        assert_eq!(billed_minutes(185), 4);
        assert_eq!(billed_minutes(i64::MAX), 153_722_867_280_912_931);
    }

    #[test]
    fn test_cost_for_longest_duration_stays_positive() {
        let calculator = VoiceCostCalculator::default();
        let longest = calculator.cost_usd(i64::MAX);
        assert!(longest > Decimal::ZERO);
        assert!(longest >= calculator.cost_usd(i64::MAX - 60));
    }

    #[test]
    fn test_cost_usd() {
        let calculator = VoiceCostCalculator::default();
        assert_eq!(calculator.cost_usd(185), dec!(0.088));
        assert_eq!(calculator.cost_usd(0), Decimal::ZERO);
        assert_eq!(calculator.cost_usd(-5), Decimal::ZERO);
    }

    #[test]
    fn test_cost_is_monotone() {
        let calculator = VoiceCostCalculator::default();
        assert!(calculator.cost_usd(61) > calculator.cost_usd(60));
        assert_eq!(calculator.cost_usd(59), calculator.cost_usd(60));

        let mut previous = Decimal::ZERO;
        for seconds in 0..=600 {
            let cost = calculator.cost_usd(seconds);
            assert!(cost >= previous);
            previous = cost;
        }
    }

    #[test]
    fn test_cost_cad_with_fallback_rate() {
        let calculator = VoiceCostCalculator::default();
        let converter = CurrencyConverter::offline(dec!(1.35));

        assert_eq!(calculator.cost_cad(185, &converter), dec!(0.1188));
    }
}
