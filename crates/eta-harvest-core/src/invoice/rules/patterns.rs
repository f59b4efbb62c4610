//! Common regex patterns for portal listing extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Portal document UUIDs: long uppercase alphanumeric runs
    pub static ref IDENTIFIER: Regex = Regex::new(
        r"\b[A-Z0-9]{20,30}\b"
    ).unwrap();

    pub static ref IDENTIFIER_EXACT: Regex = Regex::new(
        r"^[A-Z0-9]{20,30}$"
    ).unwrap();

    // Dates as the portal renders them (day first)
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b"
    ).unwrap();

    // ISO timestamps as the portal's API sends them
    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})(?:[T ](\d{2}):(\d{2})(?::(\d{2}))?)?"
    ).unwrap();

    pub static ref TIME: Regex = Regex::new(
        r"\b(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s*(AM|PM|am|pm|ص|م))?"
    ).unwrap();

    // Amounts: 1,140.00 / 1140.00 / 114 EGP
    pub static ref AMOUNT_NUMERIC: Regex = Regex::new(
        r"^-?(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.\d{2})$"
    ).unwrap();

    pub static ref CURRENCY_MARKER: Regex = Regex::new(
        r"(?i)\b(EGP|USD|EUR|GBP|SAR|AED)\b|ج\.م|جنيه"
    ).unwrap();

    pub static ref AMOUNT_WITH_CURRENCY: Regex = Regex::new(
        r"(?i)(-?\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|-?\d+(?:\.\d{1,2})?)\s*(EGP|USD|EUR|GBP|SAR|AED|ج\.م\.?|جنيه)"
    ).unwrap();

    pub static ref CURRENCY_WITH_AMOUNT: Regex = Regex::new(
        r"(?i)\b(EGP|USD|EUR|GBP|SAR|AED)\s*(-?\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|-?\d+(?:\.\d{1,2})?)"
    ).unwrap();

    pub static ref VERSION: Regex = Regex::new(
        r"^\d{1,2}\.\d$"
    ).unwrap();

    // Internal invoice numbers are short codes with at least one digit
    pub static ref INTERNAL_NUMBER: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9/_\-.#]{0,19}$"
    ).unwrap();

    // Pagination text
    pub static ref RESULTS_COUNT: Regex = Regex::new(
        r"(?i)(?:results|النتائج|نتيجة)\s*[:：]?\s*(\d[\d,]*)"
    ).unwrap();

    pub static ref RANGE_OF_TOTAL: Regex = Regex::new(
        r"(?i)(\d[\d,]*)\s*[-–—]\s*(\d[\d,]*)\s*(?:of|من)\s*(\d[\d,]*)"
    ).unwrap();

    pub static ref PAGE_LABEL: Regex = Regex::new(
        r"(?i)(?:page|صفحة)\s*(\d+)"
    ).unwrap();
}

/// Replace Arabic-Indic and Eastern Arabic-Indic digits (and the Arabic
/// decimal/thousands separators) with their ASCII forms.
pub fn normalize_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{066B}' => '.',
            '\u{066C}' => ',',
            _ => c,
        })
        .collect()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_length_bounds() {
        assert!(IDENTIFIER_EXACT.is_match("ABCDEFGHIJ0123456789"));
        assert!(IDENTIFIER_EXACT.is_match("7NBY3R0PQ9XG1W5JZ2KDV6M8TA"));
        assert!(!IDENTIFIER_EXACT.is_match("ABC123"));
        assert!(!IDENTIFIER_EXACT.is_match("abcdefghij0123456789"));
        assert!(!IDENTIFIER_EXACT.is_match("A234567890123456789012345678901"));
    }

    #[test]
    fn test_amount_shapes() {
        assert!(AMOUNT_NUMERIC.is_match("1,140.00"));
        assert!(AMOUNT_NUMERIC.is_match("114.00"));
        assert!(!AMOUNT_NUMERIC.is_match("1.0"));
        assert!(!AMOUNT_NUMERIC.is_match("2024"));
        assert!(CURRENCY_MARKER.is_match("114 EGP"));
        assert!(CURRENCY_MARKER.is_match("114 ج.م"));
    }

    #[test]
    fn test_normalize_digits() {
        assert_eq!(normalize_digits("٢٣"), "23");
        assert_eq!(normalize_digits("١٬١٤٠٫٠٠"), "1,140.00");
        assert_eq!(normalize_digits("Results: 23"), "Results: 23");
    }

    #[test]
    fn test_range_of_total() {
        let caps = RANGE_OF_TOTAL.captures("11 - 20 of 45").unwrap();
        assert_eq!(&caps[1], "11");
        assert_eq!(&caps[2], "20");
        assert_eq!(&caps[3], "45");

        let caps = RANGE_OF_TOTAL.captures("1–10 من 23").unwrap();
        assert_eq!(&caps[3], "23");
    }
}
