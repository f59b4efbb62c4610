//! Invoice record as listed by the portal.

use serde::{Deserialize, Serialize};

/// One invoice row of the portal's document listing.
///
/// Every field is a string and stays empty when no extraction strategy could
/// resolve it, so a partial record is always representable. Amount fields hold
/// plain decimal strings (`"1140.00"`); dates are `DD/MM/YYYY`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceRecord {
    /// Position in discovery order, 1-based.
    pub serial_number: String,

    /// Portal-issued document UUID.
    pub electronic_number: String,

    /// Issuer's own invoice number.
    pub internal_number: String,

    /// Submission UUID the document arrived in.
    pub submission_id: String,

    pub document_type: String,
    pub document_version: String,
    pub status: String,

    pub issue_date: String,
    pub issue_time: String,
    pub submission_date: String,

    pub invoice_currency: String,
    /// Gross total.
    pub total_amount: String,
    pub vat_amount: String,
    /// Net value (gross minus VAT).
    pub invoice_value: String,
    pub tax_discount: String,

    pub seller_name: String,
    pub seller_tax_number: String,
    pub seller_address: String,
    pub buyer_name: String,
    pub buyer_tax_number: String,
    pub buyer_address: String,

    pub purchase_order_ref: String,
    pub purchase_order_desc: String,
    pub sales_order_ref: String,

    /// Public share link derived from the identifiers, never observed.
    pub external_link: String,
}

/// Names of the extractable [`InvoiceRecord`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ElectronicNumber,
    InternalNumber,
    SubmissionId,
    DocumentType,
    DocumentVersion,
    Status,
    IssueDate,
    IssueTime,
    SubmissionDate,
    Currency,
    TotalAmount,
    VatAmount,
    NetValue,
    Discount,
    SellerName,
    SellerTaxNumber,
    SellerAddress,
    BuyerName,
    BuyerTaxNumber,
    BuyerAddress,
    PurchaseOrderRef,
    PurchaseOrderDesc,
    SalesOrderRef,
}

impl Field {
    pub const ALL: [Field; 23] = [
        Field::ElectronicNumber,
        Field::InternalNumber,
        Field::SubmissionId,
        Field::DocumentType,
        Field::DocumentVersion,
        Field::Status,
        Field::IssueDate,
        Field::IssueTime,
        Field::SubmissionDate,
        Field::Currency,
        Field::TotalAmount,
        Field::VatAmount,
        Field::NetValue,
        Field::Discount,
        Field::SellerName,
        Field::SellerTaxNumber,
        Field::SellerAddress,
        Field::BuyerName,
        Field::BuyerTaxNumber,
        Field::BuyerAddress,
        Field::PurchaseOrderRef,
        Field::PurchaseOrderDesc,
        Field::SalesOrderRef,
    ];

    /// Fields that hold monetary amounts.
    pub fn is_amount(self) -> bool {
        matches!(
            self,
            Field::TotalAmount | Field::VatAmount | Field::NetValue | Field::Discount
        )
    }
}

impl InvoiceRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::ElectronicNumber => &self.electronic_number,
            Field::InternalNumber => &self.internal_number,
            Field::SubmissionId => &self.submission_id,
            Field::DocumentType => &self.document_type,
            Field::DocumentVersion => &self.document_version,
            Field::Status => &self.status,
            Field::IssueDate => &self.issue_date,
            Field::IssueTime => &self.issue_time,
            Field::SubmissionDate => &self.submission_date,
            Field::Currency => &self.invoice_currency,
            Field::TotalAmount => &self.total_amount,
            Field::VatAmount => &self.vat_amount,
            Field::NetValue => &self.invoice_value,
            Field::Discount => &self.tax_discount,
            Field::SellerName => &self.seller_name,
            Field::SellerTaxNumber => &self.seller_tax_number,
            Field::SellerAddress => &self.seller_address,
            Field::BuyerName => &self.buyer_name,
            Field::BuyerTaxNumber => &self.buyer_tax_number,
            Field::BuyerAddress => &self.buyer_address,
            Field::PurchaseOrderRef => &self.purchase_order_ref,
            Field::PurchaseOrderDesc => &self.purchase_order_desc,
            Field::SalesOrderRef => &self.sales_order_ref,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::ElectronicNumber => &mut self.electronic_number,
            Field::InternalNumber => &mut self.internal_number,
            Field::SubmissionId => &mut self.submission_id,
            Field::DocumentType => &mut self.document_type,
            Field::DocumentVersion => &mut self.document_version,
            Field::Status => &mut self.status,
            Field::IssueDate => &mut self.issue_date,
            Field::IssueTime => &mut self.issue_time,
            Field::SubmissionDate => &mut self.submission_date,
            Field::Currency => &mut self.invoice_currency,
            Field::TotalAmount => &mut self.total_amount,
            Field::VatAmount => &mut self.vat_amount,
            Field::NetValue => &mut self.invoice_value,
            Field::Discount => &mut self.tax_discount,
            Field::SellerName => &mut self.seller_name,
            Field::SellerTaxNumber => &mut self.seller_tax_number,
            Field::SellerAddress => &mut self.seller_address,
            Field::BuyerName => &mut self.buyer_name,
            Field::BuyerTaxNumber => &mut self.buyer_tax_number,
            Field::BuyerAddress => &mut self.buyer_address,
            Field::PurchaseOrderRef => &mut self.purchase_order_ref,
            Field::PurchaseOrderDesc => &mut self.purchase_order_desc,
            Field::SalesOrderRef => &mut self.sales_order_ref,
        }
    }

    /// Set `field` only if it is still empty. Returns whether the value was taken.
    pub fn fill(&mut self, field: Field, value: &str) -> bool {
        let value = value.trim();
        let slot = self.get_mut(field);
        if slot.is_empty() && !value.is_empty() {
            *slot = value.to_string();
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self, field: Field) -> bool {
        self.get(field).is_empty()
    }

    /// Fill every empty field from another sighting of the same invoice.
    pub fn absorb(&mut self, other: &InvoiceRecord) {
        for field in Field::ALL {
            self.fill(field, other.get(field));
        }
        if self.external_link.is_empty() {
            self.external_link = other.external_link.clone();
        }
    }

    /// A record is kept only if it can be told apart from noise.
    pub fn is_valid(&self) -> bool {
        !self.electronic_number.is_empty()
            || !self.internal_number.is_empty()
            || !self.total_amount.is_empty()
    }

    /// Key used for deduplication across pages.
    pub fn identity_key(&self) -> String {
        if !self.electronic_number.is_empty() {
            return self.electronic_number.clone();
        }
        format!(
            "{}|{}|{}",
            self.internal_number, self.issue_date, self.total_amount
        )
    }
}

/// One line of an invoice's detail view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItemDetail {
    pub item_code: String,
    pub description: String,
    pub unit_code: String,
    pub unit_name: String,
    pub quantity: String,
    pub unit_price: String,
    pub total_value: String,
    pub tax_amount: String,
    pub vat_amount: String,
    pub total_with_vat: String,
}

impl LineItemDetail {
    pub fn is_empty(&self) -> bool {
        self.item_code.is_empty() && self.description.is_empty() && self.total_value.is_empty()
    }
}
