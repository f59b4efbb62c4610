//! Cross-page record accumulation with deduplication.

use indexmap::IndexMap;

use crate::models::InvoiceRecord;

/// Valid records keyed by identity, in discovery order.
///
/// A record seen again on a later page only fills gaps in the first sighting.
#[derive(Debug, Default)]
pub struct Accumulator {
    records: IndexMap<String, InvoiceRecord>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page's records. Returns how many were new.
    pub fn merge(&mut self, records: &[InvoiceRecord]) -> usize {
        let before = self.records.len();
        for record in records.iter().filter(|r| r.is_valid()) {
            self.records
                .entry(record.identity_key())
                .and_modify(|existing| existing.absorb(record))
                .or_insert_with(|| record.clone());
        }
        self.records.len() - before
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in discovery order, serials numbered 1..n.
    pub fn records(&self) -> Vec<InvoiceRecord> {
        self.records
            .values()
            .enumerate()
            .map(|(i, record)| {
                let mut record = record.clone();
                record.serial_number = (i + 1).to_string();
                record
            })
            .collect()
    }

    pub fn into_records(self) -> Vec<InvoiceRecord> {
        self.records
            .into_values()
            .enumerate()
            .map(|(i, mut record)| {
                record.serial_number = (i + 1).to_string();
                record
            })
            .collect()
    }
}
