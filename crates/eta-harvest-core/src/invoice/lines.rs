//! Line-item detail mapping for a single invoice.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::record::LineItemDetail;

use super::extractor::{flatten_item, scalar_text};
use super::rules::{format_amount, normalize_key, parse_amount};

/// Properties that hold the lines of a document payload.
const LINE_COLLECTIONS: &[&str] = &["invoiceLines", "lines", "items"];

/// Properties that identify a document in a payload.
const DOCUMENT_IDS: &[&str] = &["uuid", "electronicNumber", "documentId", "internalId", "internalNumber"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineField {
    ItemCode,
    Description,
    UnitCode,
    UnitName,
    Quantity,
    UnitPrice,
    TotalValue,
    TaxAmount,
    VatAmount,
    TotalWithVat,
}

const LINE_SYNONYMS: &[(LineField, &[&str])] = &[
    (
        LineField::ItemCode,
        &["itemCode", "internalCode", "code", "Item Code", "كود الصنف"],
    ),
    (
        LineField::Description,
        &["description", "itemDescription", "itemName", "Description", "الوصف", "البيان"],
    ),
    (LineField::UnitCode, &["unitType", "unitCode", "Unit Code", "كود الوحدة"]),
    (LineField::UnitName, &["unitName", "unitTypeName", "Unit", "الوحدة"]),
    (LineField::Quantity, &["quantity", "qty", "Quantity", "الكمية"]),
    (
        LineField::UnitPrice,
        &["unitPrice", "unitValueAmountEGP", "unitValueAmountSold", "price", "Unit Price", "سعر الوحدة"],
    ),
    (
        LineField::TotalValue,
        &["totalValue", "netTotal", "salesTotal", "Value", "Net", "القيمة"],
    ),
    (
        LineField::TaxAmount,
        &["taxAmount", "totalTaxableFees", "Tax", "الضريبة"],
    ),
    (LineField::VatAmount, &["vatAmount", "VAT", "ضريبة القيمة المضافة"]),
    (
        LineField::TotalWithVat,
        &["totalWithVat", "total", "lineTotal", "Total", "الإجمالي"],
    ),
];

impl LineField {
    fn is_amount(self) -> bool {
        matches!(
            self,
            LineField::UnitPrice
                | LineField::TotalValue
                | LineField::TaxAmount
                | LineField::VatAmount
                | LineField::TotalWithVat
        )
    }

    fn slot(self, line: &mut LineItemDetail) -> &mut String {
        match self {
            LineField::ItemCode => &mut line.item_code,
            LineField::Description => &mut line.description,
            LineField::UnitCode => &mut line.unit_code,
            LineField::UnitName => &mut line.unit_name,
            LineField::Quantity => &mut line.quantity,
            LineField::UnitPrice => &mut line.unit_price,
            LineField::TotalValue => &mut line.total_value,
            LineField::TaxAmount => &mut line.tax_amount,
            LineField::VatAmount => &mut line.vat_amount,
            LineField::TotalWithVat => &mut line.total_with_vat,
        }
    }
}

/// Build a line from `(key, text)` pairs; keys are matched loosely
/// (`"Unit Price"`, `"unitPrice"`, `"unit_price"`).
pub fn line_item_from_pairs<'a, I>(pairs: I) -> LineItemDetail
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let pairs: Vec<(String, &str)> = pairs
        .into_iter()
        .map(|(k, v)| (normalize_key(k), v.trim()))
        .collect();

    let mut line = LineItemDetail::default();
    for (field, synonyms) in LINE_SYNONYMS {
        let hit = synonyms.iter().find_map(|s| {
            let wanted = normalize_key(s);
            pairs
                .iter()
                .find(|(k, v)| *k == wanted && !v.is_empty())
                .map(|(_, v)| *v)
        });
        let Some(raw) = hit else { continue };

        let value = if field.is_amount() {
            match parse_amount(raw) {
                Some(amount) => format_amount(amount),
                None => continue,
            }
        } else {
            raw.to_string()
        };
        *field.slot(&mut line) = value;
    }
    line
}

/// Build a line from one payload object.
///
/// Tax breakdowns (`taxableItems: [{taxType, amount}]`) fill the tax total
/// and, from `T1` entries, the VAT when the line does not state them.
pub fn line_item_from_value(item: &Value) -> LineItemDetail {
    let flat = flatten_item(item);
    let mut line = line_item_from_pairs(flat.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    if let Some(taxes) = item.get("taxableItems").and_then(Value::as_array) {
        let mut total = Decimal::ZERO;
        let mut vat = Decimal::ZERO;
        for tax in taxes {
            let amount = tax
                .get("amount")
                .and_then(scalar_text)
                .and_then(|a| parse_amount(&a))
                .unwrap_or_default();
            total += amount;
            if tax.get("taxType").and_then(Value::as_str) == Some("T1") {
                vat += amount;
            }
        }
        if line.tax_amount.is_empty() && !taxes.is_empty() {
            line.tax_amount = format_amount(total);
        }
        if line.vat_amount.is_empty() && !taxes.is_empty() {
            line.vat_amount = format_amount(vat);
        }
    }
    line
}

/// Find the lines of document `invoice_id` anywhere in a payload.
///
/// Returns `None` when no object identified as that document carries a
/// collection of line-shaped objects.
pub fn line_items_from_payload(payload: &Value, invoice_id: &str) -> Option<Vec<LineItemDetail>> {
    find_document(payload, invoice_id, 0).and_then(document_lines)
}

fn find_document<'a>(value: &'a Value, invoice_id: &str, depth: usize) -> Option<&'a Value> {
    if depth > 4 {
        return None;
    }
    match value {
        Value::Object(object) => {
            let matches = DOCUMENT_IDS.iter().any(|k| {
                object
                    .get(*k)
                    .and_then(scalar_text)
                    .is_some_and(|id| id == invoice_id)
            });
            if matches && document_lines(value).is_some() {
                return Some(value);
            }
            object
                .values()
                .find_map(|v| find_document(v, invoice_id, depth + 1))
        }
        Value::Array(items) => items
            .iter()
            .find_map(|v| find_document(v, invoice_id, depth + 1)),
        _ => None,
    }
}

fn document_lines(document: &Value) -> Option<Vec<LineItemDetail>> {
    LINE_COLLECTIONS.iter().find_map(|key| {
        let items = document.get(*key)?.as_array()?;
        let lines: Vec<LineItemDetail> = items
            .iter()
            .filter(|i| i.is_object())
            .map(line_item_from_value)
            .filter(|l| !l.is_empty())
            .collect();
        (!lines.is_empty()).then_some(lines)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_line_from_headers() {
        let line = line_item_from_pairs([
            ("Item Code", "EG-123"),
            ("Description", "Consulting"),
            ("Quantity", "2"),
            ("Unit Price", "50"),
            ("Total", "114.00"),
        ]);

        assert_eq!(line.item_code, "EG-123");
        assert_eq!(line.quantity, "2");
        assert_eq!(line.unit_price, "50.00");
        assert_eq!(line.total_with_vat, "114.00");
        assert!(line.vat_amount.is_empty());
    }

    #[test]
    fn test_lines_from_document_payload() {
        let payload = json!({
            "result": [{
                "uuid": "7NBY3R0PQ9XG1W5JZ2KDV6M8TA",
                "invoiceLines": [{
                    "itemCode": "EG-123",
                    "description": "Consulting",
                    "unitType": "EA",
                    "quantity": 1,
                    "unitValue": {"currencySold": "EGP", "amountEGP": 100},
                    "salesTotal": 100,
                    "total": 114,
                    "taxableItems": [
                        {"taxType": "T1", "amount": 14},
                        {"taxType": "T4", "amount": 0}
                    ]
                }]
            }]
        });

        let lines = line_items_from_payload(&payload, "7NBY3R0PQ9XG1W5JZ2KDV6M8TA").unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].unit_code, "EA");
        assert_eq!(lines[0].unit_price, "100.00");
        assert_eq!(lines[0].total_value, "100.00");
        assert_eq!(lines[0].vat_amount, "14.00");
        assert_eq!(lines[0].tax_amount, "14.00");
        assert_eq!(lines[0].total_with_vat, "114.00");
    }

    #[test]
    fn test_other_document_is_not_used() {
        let payload = json!({"uuid": "OTHER", "lines": [{"itemCode": "X", "total": 1}]});
        assert!(line_items_from_payload(&payload, "WANTED").is_none());
    }
}
