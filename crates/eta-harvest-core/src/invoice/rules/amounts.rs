//! Amount parsing and the flat-rate tax split.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use super::patterns::{normalize_digits, AMOUNT_NUMERIC, CURRENCY_MARKER};

/// Parse an amount as rendered by the portal (e.g., "1,140.00 EGP", "114", "١١٤٫٠٠").
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = normalize_digits(s);
    let negative = s.trim_start().starts_with('-');

    // Drop currency words, thousands separators and anything else non-numeric
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    // A lone comma followed by exactly two digits is a decimal comma
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), None) if cleaned.len() - c == 3 && cleaned.matches(',').count() == 1 => {
            cleaned.replace(',', ".")
        }
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        _ => cleaned.replace(',', ""),
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Whether a single token looks like a monetary amount.
pub fn is_amount_token(token: &str) -> bool {
    let token = normalize_digits(token.trim());
    if token.is_empty() || !token.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    if CURRENCY_MARKER.is_match(&token) {
        return parse_amount(&token).is_some();
    }
    AMOUNT_NUMERIC.is_match(&token)
}

/// Canonical two-decimal rendering used in records.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Normalize an amount string, keeping the raw text when it does not parse.
pub fn normalize_amount(raw: &str) -> String {
    match parse_amount(raw) {
        Some(value) => format_amount(value),
        None => raw.trim().to_string(),
    }
}

/// Split a gross total into `(tax, net)` assuming a single flat rate `r`.
///
/// `tax = gross·r/(1+r)` rounded to cents and `net = gross − tax`, so the two
/// always add back up to `gross`. This is an approximation: invoices with
/// mixed or zero-rated lines are split wrongly and nothing here can tell.
pub fn split_gross(gross: Decimal, rate: Decimal) -> (Decimal, Decimal) {
    let divisor = Decimal::ONE + rate;
    if divisor.is_zero() {
        return (Decimal::ZERO, gross);
    }
    let tax = (gross * rate / divisor)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (tax, gross - tax)
}
