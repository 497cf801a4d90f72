//! SMS segment calculator
//!
//! Detects whether a message fits the GSM 03.38 7-bit alphabet and counts
//! the carrier segments it will be billed as.

use relaybill_core::models::SmsEncoding;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::constants::DEFAULT_SMS_RATE_PER_SEGMENT;

/// GSM 03.38 basic character set (escape excluded)
const GSM7_BASIC: &str = concat!(
    "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ",
    " !\"#¤%&'()*+,-./0123456789:;<=>?",
    "¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§",
    "¿abcdefghijklmnopqrstuvwxyzäöñüà",
);

/// GSM 03.38 extension table, reached through the escape code
const GSM7_EXTENSION: &str = "^{}\\[~]|€\u{000C}";

/// Whether `c` can be sent in a GSM-7 message
pub fn is_gsm7_char(c: char) -> bool {
    GSM7_BASIC.contains(c) || GSM7_EXTENSION.contains(c)
}

/// Encoding a message will be sent with
pub fn detect_encoding(text: &str) -> SmsEncoding {
    if text.chars().all(is_gsm7_char) {
        SmsEncoding::Gsm7
    } else {
        SmsEncoding::Ucs2
    }
}

/// Length of `text` in the units its encoding is segmented by
///
/// Characters for GSM-7, UTF-16 code units for UCS-2.
pub fn encoded_length(text: &str, encoding: SmsEncoding) -> usize {
    match encoding {
        SmsEncoding::Gsm7 => text.chars().count(),
        SmsEncoding::Ucs2 => text.encode_utf16().count(),
    }
}

/// Number of billable segments for `text`
///
/// # Examples
///
/// ```
/// use relaybill_services::sms::count_segments;
///
/// assert_eq!(count_segments("Hello there!"), 1);
/// assert_eq!(count_segments(&"a".repeat(161)), 2);
/// assert_eq!(count_segments(""), 0);
/// ```
pub fn count_segments(text: &str) -> u32 {
    let encoding = detect_encoding(text);
    encoding.segments_for_length(encoded_length(text, encoding))
}

/// Result of analyzing one message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SmsAnalysis {
    pub encoding: SmsEncoding,
    /// Length in encoding units
    pub length: usize,
    pub segments: u32,
}

/// Segment counter priced at a per-segment rate
#[derive(Debug, Clone)]
pub struct SmsSegmentCalculator {
    rate_per_segment_usd: Decimal,
}

impl Default for SmsSegmentCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SMS_RATE_PER_SEGMENT)
    }
}

impl SmsSegmentCalculator {
    pub fn new(rate_per_segment_usd: Decimal) -> Self {
        Self {
            rate_per_segment_usd,
        }
    }

    pub fn rate_per_segment_usd(&self) -> Decimal {
        self.rate_per_segment_usd
    }

    /// Encoding, length and segment count of `text`
    pub fn analyze(&self, text: &str) -> SmsAnalysis {
        let encoding = detect_encoding(text);
        let length = encoded_length(text, encoding);
        let segments = encoding.segments_for_length(length);

        debug!(%encoding, length, segments, "Analyzed SMS body");

        SmsAnalysis {
            encoding,
            length,
            segments,
        }
    }

    /// USD cost of `segments` segments
    #[inline]
    pub fn cost_usd(&self, segments: u32) -> Decimal {
        Decimal::from(segments) * self.rate_per_segment_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_plain_ascii_is_gsm7() {
        assert_eq!(detect_encoding("Hello there!"), SmsEncoding::Gsm7);
        assert_eq!(count_segments("Hello there!"), 1);
    }

    #[test]
    fn test_extension_chars_stay_gsm7() {
        assert_eq!(detect_encoding("Total: 5€ [paid] {ok} ~ | ^ \\"), SmsEncoding::Gsm7);
        assert!(is_gsm7_char('\u{000C}'));
        assert!(is_gsm7_char('é'));
        assert!(is_gsm7_char('Ñ'));
    }

    #[test]
    fn test_non_gsm_switches_to_ucs2() {
        assert_eq!(detect_encoding("Ça va? ç"), SmsEncoding::Ucs2);
        assert_eq!(detect_encoding("Great 👍"), SmsEncoding::Ucs2);
        assert!(!is_gsm7_char('ç'));
        assert!(!is_gsm7_char('`'));
    }

    #[test]
    fn test_gsm7_segment_boundaries() {
        assert_eq!(count_segments(&"a".repeat(160)), 1);
        assert_eq!(count_segments(&"a".repeat(161)), 2);
        assert_eq!(count_segments(&"a".repeat(304)), 2);
        assert_eq!(count_segments(&"a".repeat(305)), 3);
    }

    #[test]
    fn test_ucs2_segment_boundaries() {
        let base = "ç".repeat(70);
        assert_eq!(count_segments(&base), 1);
        assert_eq!(count_segments(&format!("{}ç", base)), 2);
        assert_eq!(count_segments(&"ç".repeat(132)), 2);
        assert_eq!(count_segments(&"ç".repeat(133)), 3);
    }

    #[test]
    fn test_emoji_counts_as_two_units() {
        let text = "👍".repeat(35);
        assert_eq!(encoded_length(&text, SmsEncoding::Ucs2), 70);
        assert_eq!(count_segments(&text), 1);
        assert_eq!(count_segments(&format!("{}a", text)), 2);
    }

    #[test]
    fn test_empty_text() {
        let analysis = SmsSegmentCalculator::default().analyze("");
        assert_eq!(analysis.segments, 0);
        assert_eq!(analysis.length, 0);
        assert_eq!(analysis.encoding, SmsEncoding::Gsm7);
    }

    #[test]
    fn test_analyze_and_cost() {
        let calculator = SmsSegmentCalculator::new(dec!(0.0083));
        let analysis = calculator.analyze(&"x".repeat(200));

        assert_eq!(analysis.segments, 2);
        assert_eq!(calculator.cost_usd(analysis.segments), dec!(0.0166));
        assert_eq!(calculator.cost_usd(0), Decimal::ZERO);
    }
}
