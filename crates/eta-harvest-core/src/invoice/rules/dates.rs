//! Date and time normalization for listing fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use super::patterns::{normalize_digits, DATE_DMY, DATE_ISO, TIME};

/// A date (and, when present, a time of day) found in a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    /// `DD/MM/YYYY`.
    pub date: String,
    /// `HH:MM:SS`.
    pub time: Option<String>,
}

/// Normalize a raw date/timestamp value into a [`DateMatch`].
///
/// Accepts RFC 3339 timestamps, naive ISO date-times and dates, and the
/// portal's `D/M/YYYY` rendering. Returns `None` if no date shape is present.
pub fn parse_date(raw: &str) -> Option<DateMatch> {
    let raw = normalize_digits(raw.trim());
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Some(from_naive(dt.naive_local()));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&raw, format) {
            return Some(from_naive(dt));
        }
    }

    if let Some(caps) = DATE_DMY.captures(&raw) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        let date = match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) => date.format("%d/%m/%Y").to_string(),
            None => caps[0].to_string(),
        };
        return Some(DateMatch {
            date,
            time: find_time(&raw[caps.get(0)?.end()..]),
        });
    }

    if let Some(caps) = DATE_ISO.captures(&raw) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = match (caps.get(4), caps.get(5)) {
            (Some(h), Some(m)) => Some(format!(
                "{}:{}:{}",
                h.as_str(),
                m.as_str(),
                caps.get(6).map_or("00", |s| s.as_str())
            )),
            _ => None,
        };
        return Some(DateMatch {
            date: date.format("%d/%m/%Y").to_string(),
            time,
        });
    }

    None
}

/// Whether a single token is date-shaped.
pub fn is_date_token(token: &str) -> bool {
    let token = normalize_digits(token);
    DATE_DMY.is_match(&token) || DATE_ISO.is_match(&token)
}

/// First time of day in `text`, as `HH:MM:SS` (12-hour clock converted).
pub fn find_time(text: &str) -> Option<String> {
    let text = normalize_digits(text);
    let caps = TIME.captures(&text)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps.get(3).map_or(Some(0), |s| s.as_str().parse().ok())?;

    match caps.get(4).map(|m| m.as_str().to_lowercase()) {
        Some(ref p) if (p == "pm" || p == "م") && hour < 12 => hour += 12,
        Some(ref p) if (p == "am" || p == "ص") && hour == 12 => hour = 0,
        _ => {}
    }

    NaiveTime::from_hms_opt(hour, minute, second).map(|t| t.format("%H:%M:%S").to_string())
}

fn from_naive(dt: NaiveDateTime) -> DateMatch {
    DateMatch {
        date: dt.format("%d/%m/%Y").to_string(),
        time: Some(dt.format("%H:%M:%S").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_portal_date() {
        let m = parse_date("5/1/2024").unwrap();
        assert_eq!(m.date, "05/01/2024");
        assert_eq!(m.time, None);

        let m = parse_date("15/01/2024 3:05 PM").unwrap();
        assert_eq!(m.date, "15/01/2024");
        assert_eq!(m.time.as_deref(), Some("15:05:00"));
    }

    #[test]
    fn test_parse_iso_timestamp() {
        let m = parse_date("2024-01-15T10:20:30Z").unwrap();
        assert_eq!(m.date, "15/01/2024");
        assert_eq!(m.time.as_deref(), Some("10:20:30"));

        let m = parse_date("2024-01-15T10:20:30.1234567").unwrap();
        assert_eq!(m.date, "15/01/2024");

        let m = parse_date("2024-03-02").unwrap();
        assert_eq!(m.date, "02/03/2024");
        assert_eq!(m.time, None);
    }

    #[test]
    fn test_not_a_date() {
        assert_eq!(parse_date("1,140.00"), None);
        assert_eq!(parse_date(""), None);
        assert!(!is_date_token("INV-001"));
        assert!(is_date_token("١٥/٠١/٢٠٢٤"));
    }
}
