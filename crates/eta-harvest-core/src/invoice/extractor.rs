//! Multi-strategy invoice record extractor.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::trace;

use crate::models::config::HarvestConfig;
use crate::models::record::{Field, InvoiceRecord};

use super::rules::{
    amounts::{format_amount, is_amount_token, normalize_amount, parse_amount, split_gross},
    dates::{find_time, is_date_token, parse_date},
    keys::{normalize_key, resolve_keyed},
    link::share_link,
    patterns::*,
};
use super::{InvoiceExtractor, RecordSource};

type Strategy = fn(&RecordExtractor, &RecordSource<'_>, &mut InvoiceRecord);

/// Strategies in the order they run. Each one only fills fields that are
/// still empty, so earlier strategies take precedence.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("keyed", RecordExtractor::keyed),
    ("positional", RecordExtractor::positional),
    ("free_text", RecordExtractor::free_text),
];

const STATUS_WORDS: &[&str] = &[
    "valid",
    "invalid",
    "rejected",
    "cancelled",
    "canceled",
    "submitted",
    "pending",
    "صالحة",
    "صالح",
    "غير صالحة",
    "مرفوضة",
    "ملغاة",
    "ملغية",
    "مقدمة",
];

const DOCUMENT_TYPES: &[&str] = &[
    "invoice",
    "credit note",
    "debit note",
    "فاتورة",
    "إشعار دائن",
    "اشعار دائن",
    "إشعار مدين",
    "اشعار مدين",
];

const ACTION_LABELS: &[&str] = &["view", "details", "عرض", "تفاصيل", "download", "تحميل"];

/// Record extractor running keyed, positional and free-text strategies in turn.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    /// Flat VAT rate for splitting a gross total.
    tax_rate: Decimal,
    /// Currency assumed when amounts are present without one.
    default_currency: String,
    /// Leading cells/properties inspected positionally.
    positional_window: usize,
    /// Prefix of derived share links.
    share_base_url: String,
}

impl RecordExtractor {
    /// Create an extractor with default settings.
    pub fn new() -> Self {
        Self::from_config(&HarvestConfig::default())
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            tax_rate: config.extraction.tax_rate,
            default_currency: config.extraction.default_currency.clone(),
            positional_window: config.extraction.positional_window,
            share_base_url: config.portal.share_base_url.clone(),
        }
    }

    /// Set the flat VAT rate.
    pub fn with_tax_rate(mut self, rate: Decimal) -> Self {
        self.tax_rate = rate;
        self
    }

    /// Set the default currency.
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    /// Keyed-attribute strategy: declared cell keys or payload property names.
    fn keyed(&self, source: &RecordSource<'_>, record: &mut InvoiceRecord) {
        let mut values: HashMap<String, String> = HashMap::new();
        match source {
            RecordSource::Row(row) => {
                for (key, text) in &row.keyed {
                    let slot = values.entry(normalize_key(key)).or_default();
                    if slot.is_empty() {
                        *slot = text.clone();
                    }
                }
            }
            RecordSource::Network { item, .. } => {
                for (key, value) in flatten_item(item) {
                    values.entry(key).or_insert(value);
                }
            }
        }

        for (field, value) in resolve_keyed(&values) {
            self.assign(record, field, &value);
        }
    }

    /// Positional strategy: classify a window of sequential tokens by shape.
    fn positional(&self, source: &RecordSource<'_>, record: &mut InvoiceRecord) {
        let tokens: Vec<String> = match source {
            RecordSource::Row(row) => row.cells.clone(),
            RecordSource::Network { item, .. } => {
                flatten_item(item).into_iter().map(|(_, v)| v).collect()
            }
        };

        let mut identifiers = Vec::new();
        let mut dates = Vec::new();
        let mut amounts = Vec::new();
        let mut internal = None;

        for token in tokens.iter().take(self.positional_window) {
            let token = collapse_whitespace(token);
            if token.is_empty() {
                continue;
            }
            let normalized = normalize_digits(&token);
            let lower = token.to_lowercase();

            if IDENTIFIER_EXACT.is_match(&normalized) {
                identifiers.push(normalized);
            } else if is_date_token(&normalized) {
                dates.push(token);
            } else if is_amount_token(&normalized) {
                amounts.push(token);
            } else if VERSION.is_match(&normalized) {
                record.fill(Field::DocumentVersion, &normalized);
            } else if STATUS_WORDS.contains(&lower.as_str()) {
                record.fill(Field::Status, &token);
            } else if DOCUMENT_TYPES.contains(&lower.as_str()) {
                record.fill(Field::DocumentType, &token);
            } else if ACTION_LABELS.iter().any(|a| lower.contains(a)) {
                continue;
            } else if internal.is_none() && looks_like_internal_number(&normalized) {
                internal = Some(normalized);
            }
        }

        self.assign_identifiers(record, &identifiers);
        self.assign_dates(record, &dates);
        self.assign_amounts(record, &amounts);
        if let Some(internal) = internal {
            record.fill(Field::InternalNumber, &internal);
        }
    }

    /// Free-text strategy: regular-expression shapes over the whole record text.
    fn free_text(&self, source: &RecordSource<'_>, record: &mut InvoiceRecord) {
        let text = match source {
            RecordSource::Row(row) => row.text.clone(),
            RecordSource::Network { item, .. } => flatten_item(item)
                .into_iter()
                .map(|(_, v)| v)
                .collect::<Vec<_>>()
                .join(" "),
        };
        let text = normalize_digits(&text);

        let mut identifiers: Vec<String> = Vec::new();
        for m in IDENTIFIER.find_iter(&text) {
            if !identifiers.iter().any(|i| i == m.as_str()) {
                identifiers.push(m.as_str().to_string());
            }
        }
        self.assign_identifiers(record, &identifiers);

        let mut dates: Vec<String> = DATE_DMY
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect();
        if dates.is_empty() {
            dates = DATE_ISO
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .collect();
        }
        self.assign_dates(record, &dates);
        if let Some(first) = DATE_DMY.find(&text) {
            if let Some(time) = find_time(&text[first.end()..]) {
                record.fill(Field::IssueTime, &time);
            }
        }

        let mut amounts: Vec<(usize, String, String)> = AMOUNT_WITH_CURRENCY
            .captures_iter(&text)
            .filter_map(|c| Some((c.get(0)?.start(), c[1].to_string(), c[2].to_string())))
            .collect();
        for c in CURRENCY_WITH_AMOUNT.captures_iter(&text) {
            if let Some(m) = c.get(0) {
                let overlaps = amounts.iter().any(|(start, _, _)| *start >= m.start() && *start < m.end());
                if !overlaps {
                    amounts.push((m.start(), c[2].to_string(), c[1].to_string()));
                }
            }
        }
        amounts.sort_by_key(|(start, _, _)| *start);

        if let Some((_, _, currency)) = amounts.first() {
            record.fill(Field::Currency, &currency_code(currency));
        }
        let values: Vec<String> = amounts.into_iter().map(|(_, v, _)| v).collect();
        self.assign_amounts(record, &values);
    }

    /// Store a raw value into `field`, normalized for the field's kind.
    fn assign(&self, record: &mut InvoiceRecord, field: Field, raw: &str) -> bool {
        let raw = collapse_whitespace(raw);
        if raw.is_empty() {
            return false;
        }

        match field {
            f if f.is_amount() => {
                if parse_amount(&raw).is_none() {
                    return false;
                }
                if let Some(m) = CURRENCY_MARKER.find(&raw) {
                    record.fill(Field::Currency, &currency_code(m.as_str()));
                }
                record.fill(f, &normalize_amount(&raw))
            }
            Field::IssueDate | Field::SubmissionDate => match parse_date(&raw) {
                Some(m) => {
                    if field == Field::IssueDate {
                        if let Some(time) = &m.time {
                            record.fill(Field::IssueTime, time);
                        }
                    }
                    record.fill(field, &m.date)
                }
                None => record.fill(field, &raw),
            },
            Field::IssueTime => {
                let time = find_time(&raw).unwrap_or(raw);
                record.fill(field, &time)
            }
            Field::Currency => record.fill(field, &currency_code(&raw)),
            _ => record.fill(field, &raw),
        }
    }

    fn assign_identifiers(&self, record: &mut InvoiceRecord, identifiers: &[String]) {
        let mut rest = identifiers.iter();
        if record.is_empty(Field::ElectronicNumber) {
            if let Some(first) = rest.next() {
                record.fill(Field::ElectronicNumber, first);
            }
        }
        for other in rest {
            if other != &record.electronic_number {
                record.fill(Field::SubmissionId, other);
                break;
            }
        }
    }

    fn assign_dates(&self, record: &mut InvoiceRecord, dates: &[String]) {
        let claimed = [record.issue_date.clone(), record.submission_date.clone()];
        let mut dates = dates.iter().filter(|d| {
            parse_date(d).is_none_or(|m| !claimed.contains(&m.date))
        });
        if let Some(first) = dates.next() {
            self.assign(record, Field::IssueDate, first);
        }
        if let Some(second) = dates.next() {
            self.assign(record, Field::SubmissionDate, second);
        }
    }

    /// Amounts in reading order: net, VAT, total; the last one is always the total.
    ///
    /// Values already held by an amount field were claimed by an earlier
    /// strategy and do not take part in the role assignment.
    fn assign_amounts(&self, record: &mut InvoiceRecord, amounts: &[String]) {
        let claimed: Vec<Decimal> = [Field::TotalAmount, Field::VatAmount, Field::NetValue]
            .iter()
            .filter_map(|f| parse_amount(record.get(*f)))
            .collect();
        let amounts: Vec<&String> = amounts
            .iter()
            .filter(|a| parse_amount(a).is_some_and(|v| !claimed.contains(&v)))
            .collect();

        match amounts.as_slice() {
            [] => {}
            [total] => {
                self.assign(record, Field::TotalAmount, total);
            }
            [net, total] => {
                self.assign(record, Field::NetValue, net);
                self.assign(record, Field::TotalAmount, total);
            }
            [.., net, vat, total] => {
                self.assign(record, Field::NetValue, net);
                self.assign(record, Field::VatAmount, vat);
                self.assign(record, Field::TotalAmount, total);
            }
        }
    }

    /// Fill derived fields: tax split, default currency, share link, serial.
    fn finish(&self, record: &mut InvoiceRecord, index: usize) {
        // Known amounts win; the configured rate only splits a bare gross.
        if let Some(gross) = parse_amount(&record.total_amount) {
            match (
                parse_amount(&record.vat_amount),
                parse_amount(&record.invoice_value),
            ) {
                (Some(vat), _) => {
                    record.fill(Field::NetValue, &format_amount(gross - vat));
                }
                (None, Some(net)) => {
                    record.vat_amount = format_amount(gross - net);
                }
                (None, None) => {
                    let (tax, net) = split_gross(gross, self.tax_rate);
                    record.vat_amount = format_amount(tax);
                    record.fill(Field::NetValue, &format_amount(net));
                }
            }
        }

        let has_amount = [Field::TotalAmount, Field::VatAmount, Field::NetValue]
            .iter()
            .any(|f| !record.is_empty(*f));
        if has_amount {
            record.fill(Field::Currency, &self.default_currency);
        }

        if record.external_link.is_empty() {
            record.external_link = share_link(
                &self.share_base_url,
                &record.electronic_number,
                &record.submission_id,
            );
        }

        record.serial_number = (index + 1).to_string();
    }
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceExtractor for RecordExtractor {
    fn extract(&self, source: RecordSource<'_>) -> InvoiceRecord {
        let mut record = InvoiceRecord::new();

        for (name, strategy) in STRATEGIES {
            strategy(self, &source, &mut record);
            trace!(strategy = name, valid = record.is_valid(), "applied strategy");
        }

        self.finish(&mut record, source.index());
        record
    }
}

/// Flatten a payload item into `(normalized key, text)` pairs.
///
/// Nested objects contribute prefixed keys (`seller.name` → `sellername`);
/// an object nested one level deeper (an address) is joined into one value.
pub(crate) fn flatten_item(item: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let Some(object) = item.as_object() else {
        return pairs;
    };

    for (key, value) in object {
        match value {
            Value::Object(inner) => {
                for (inner_key, inner_value) in inner {
                    let text = match inner_value {
                        Value::Object(deep) => deep
                            .values()
                            .filter_map(scalar_text)
                            .filter(|s| !s.is_empty())
                            .collect::<Vec<_>>()
                            .join(", "),
                        other => scalar_text(other).unwrap_or_default(),
                    };
                    pairs.push((normalize_key(&format!("{key}{inner_key}")), text));
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((normalize_key(key), text));
                }
            }
        }
    }
    pairs
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn looks_like_internal_number(token: &str) -> bool {
    INTERNAL_NUMBER.is_match(token)
        && token.chars().any(|c| c.is_ascii_digit())
        && (token.len() >= 3 || token.chars().any(|c| c.is_ascii_alphabetic()))
}

fn currency_code(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("ج") {
        "EGP".to_string()
    } else {
        raw.to_uppercase()
    }
}
