//! Field-key synonyms for keyed sources (API properties, cell attributes, column headers).

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::models::record::Field;

/// Synonyms per field, in priority order. The first synonym with a
/// non-empty value wins. English API names and English/Arabic column labels.
pub const FIELD_SYNONYMS: &[(Field, &[&str])] = &[
    (
        Field::ElectronicNumber,
        &[
            "electronicNumber",
            "uuid",
            "documentId",
            "documentUuid",
            "Electronic Number",
            "UUID",
            "الرقم الإلكتروني",
            "الرقم الالكتروني",
        ],
    ),
    (
        Field::InternalNumber,
        &[
            "internalNumber",
            "internalId",
            "referenceNumber",
            "Internal Number",
            "Internal ID",
            "الرقم الداخلي",
        ],
    ),
    (
        Field::SubmissionId,
        &["submissionId", "submissionUuid", "longId", "Submission ID", "رقم الإرسال"],
    ),
    (
        Field::DocumentType,
        &[
            "documentType",
            "typeName",
            "documentTypeNamePrimaryLang",
            "type",
            "Document Type",
            "Type",
            "نوع المستند",
            "النوع",
        ],
    ),
    (
        Field::DocumentVersion,
        &[
            "documentVersion",
            "typeVersionName",
            "version",
            "Version",
            "الإصدار",
            "النسخة",
        ],
    ),
    (Field::Status, &["status", "state", "Status", "الحالة"]),
    (
        Field::IssueDate,
        &[
            "issueDate",
            "dateTimeIssued",
            "createdDate",
            "Issue Date",
            "Date Issued",
            "تاريخ الإصدار",
        ],
    ),
    (Field::IssueTime, &["issueTime", "timeIssued", "Issue Time", "وقت الإصدار"]),
    (
        Field::SubmissionDate,
        &[
            "submissionDate",
            "dateTimeReceived",
            "submittedDate",
            "Submission Date",
            "Date Received",
            "تاريخ التقديم",
            "تاريخ الاستلام",
        ],
    ),
    (
        Field::Currency,
        &["invoiceCurrency", "currency", "currencySold", "Currency", "العملة"],
    ),
    (
        Field::TotalAmount,
        &[
            "totalAmount",
            "totalSalesAmount",
            "total",
            "grandTotal",
            "Total",
            "Total Amount",
            "الإجمالي",
            "إجمالي الفاتورة",
        ],
    ),
    (
        Field::VatAmount,
        &[
            "vatAmount",
            "taxAmount",
            "vat",
            "totalTax",
            "VAT",
            "Tax",
            "ضريبة القيمة المضافة",
            "الضريبة",
        ],
    ),
    (
        Field::NetValue,
        &[
            "invoiceValue",
            "netAmount",
            "amount",
            "Net Amount",
            "Value",
            "القيمة",
            "صافي القيمة",
        ],
    ),
    (
        Field::Discount,
        &["taxDiscount", "discount", "totalDiscount", "Discount", "الخصم"],
    ),
    (
        Field::SellerName,
        &["sellerName", "issuerName", "Seller", "Issuer", "البائع", "المصدر"],
    ),
    (
        Field::SellerTaxNumber,
        &[
            "sellerTaxNumber",
            "issuerTaxNumber",
            "issuerId",
            "sellerId",
            "Seller Tax Number",
            "Issuer ID",
            "الرقم الضريبي للبائع",
        ],
    ),
    (Field::SellerAddress, &["sellerAddress", "issuerAddress", "عنوان البائع"]),
    (
        Field::BuyerName,
        &["buyerName", "receiverName", "Buyer", "Receiver", "المشتري", "المستلم"],
    ),
    (
        Field::BuyerTaxNumber,
        &[
            "buyerTaxNumber",
            "receiverTaxNumber",
            "receiverId",
            "buyerId",
            "Buyer Tax Number",
            "Receiver ID",
            "الرقم الضريبي للمشتري",
        ],
    ),
    (Field::BuyerAddress, &["buyerAddress", "receiverAddress", "عنوان المشتري"]),
    (
        Field::PurchaseOrderRef,
        &["purchaseOrderRef", "poReference", "purchaseOrderReference"],
    ),
    (
        Field::PurchaseOrderDesc,
        &["purchaseOrderDesc", "poDescription", "purchaseOrderDescription"],
    ),
    (
        Field::SalesOrderRef,
        &["salesOrderRef", "soReference", "salesOrderReference"],
    ),
];

lazy_static! {
    static ref KEY_INDEX: HashMap<String, Field> = {
        let mut index = HashMap::new();
        for (field, synonyms) in FIELD_SYNONYMS {
            for synonym in synonyms.iter() {
                index.entry(normalize_key(synonym)).or_insert(*field);
            }
        }
        index
    };
}

/// Case-, space- and punctuation-insensitive form of a key.
///
/// `"Total Amount"`, `"totalAmount"` and `"total_amount"` all normalize to
/// `"totalamount"`; Arabic letters are kept.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Field a single key maps to, if any.
pub fn field_for_key(key: &str) -> Option<Field> {
    KEY_INDEX.get(&normalize_key(key)).copied()
}

/// Resolve fields from a normalized key/value table, honoring synonym priority.
pub fn resolve_keyed(values: &HashMap<String, String>) -> Vec<(Field, String)> {
    let mut resolved = Vec::new();
    for (field, synonyms) in FIELD_SYNONYMS {
        let hit = synonyms
            .iter()
            .filter_map(|s| values.get(&normalize_key(s)))
            .find(|v| !v.trim().is_empty());
        if let Some(value) = hit {
            resolved.push((*field, value.clone()));
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Total Amount"), "totalamount");
        assert_eq!(normalize_key("total_amount"), "totalamount");
        assert_eq!(normalize_key("totalAmount"), "totalamount");
        assert_eq!(normalize_key("الرقم الداخلي"), "الرقمالداخلي");
    }

    #[test]
    fn test_field_for_key() {
        assert_eq!(field_for_key("dateTimeIssued"), Some(Field::IssueDate));
        assert_eq!(field_for_key("Electronic Number"), Some(Field::ElectronicNumber));
        assert_eq!(field_for_key("الإجمالي"), Some(Field::TotalAmount));
        assert_eq!(field_for_key("netAmount"), Some(Field::NetValue));
        assert_eq!(field_for_key("actions"), None);
    }

    #[test]
    fn test_resolve_keyed_priority() {
        let mut values = HashMap::new();
        values.insert("total".to_string(), "50".to_string());
        values.insert("totalamount".to_string(), "114".to_string());
        values.insert("uuid".to_string(), "".to_string());

        let resolved = resolve_keyed(&values);
        assert!(resolved.contains(&(Field::TotalAmount, "114".to_string())));
        assert!(!resolved.iter().any(|(f, _)| *f == Field::ElectronicNumber));
    }
}
