//! SMS encoding model
//!
//! Carrier segment sizes for the two SMS alphabets, using toll-free
//! per-segment limits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Character encoding a message will be sent with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmsEncoding {
    /// GSM 03.38 7-bit default alphabet
    #[default]
    Gsm7,
    /// 16-bit Unicode, used as soon as one character falls outside GSM-7
    Ucs2,
}

impl SmsEncoding {
    /// Maximum length that still fits in a single segment
    #[inline]
    pub const fn single_segment_limit(self) -> usize {
        match self {
            SmsEncoding::Gsm7 => 160,
            SmsEncoding::Ucs2 => 70,
        }
    }

    /// Payload per segment once a message is split
    #[inline]
    pub const fn multipart_segment_size(self) -> usize {
        match self {
            SmsEncoding::Gsm7 => 152,
            SmsEncoding::Ucs2 => 66,
        }
    }

    /// Number of segments for a message of `length` units in this encoding
    pub fn segments_for_length(self, length: usize) -> u32 {
        if length == 0 {
            return 0;
        }
        if length <= self.single_segment_limit() {
            return 1;
        }
        length.div_ceil(self.multipart_segment_size()) as u32
    }
}

impl fmt::Display for SmsEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmsEncoding::Gsm7 => write!(f, "GSM-7"),
            SmsEncoding::Ucs2 => write!(f, "UCS-2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsm7_thresholds() {
        assert_eq!(SmsEncoding::Gsm7.segments_for_length(0), 0);
        assert_eq!(SmsEncoding::Gsm7.segments_for_length(160), 1);
        assert_eq!(SmsEncoding::Gsm7.segments_for_length(161), 2);
        assert_eq!(SmsEncoding::Gsm7.segments_for_length(304), 2);
        assert_eq!(SmsEncoding::Gsm7.segments_for_length(305), 3);
    }

    #[test]
    fn test_ucs2_thresholds() {
        assert_eq!(SmsEncoding::Ucs2.segments_for_length(70), 1);
        assert_eq!(SmsEncoding::Ucs2.segments_for_length(71), 2);
        assert_eq!(SmsEncoding::Ucs2.segments_for_length(132), 2);
        assert_eq!(SmsEncoding::Ucs2.segments_for_length(133), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(SmsEncoding::Gsm7.to_string(), "GSM-7");
        assert_eq!(SmsEncoding::Ucs2.to_string(), "UCS-2");
    }
}
