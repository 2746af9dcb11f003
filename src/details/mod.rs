//! Read-side tax detail aggregates.
//!
//! The stable boundary between the engine and e-invoicing consumers:
//! per-line and per-document amounts keyed by fingerprint, in both the
//! document and the company currency. No mutation, no diffing — these
//! iterate the same evaluation the document driver runs.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::document::evaluate_document;
use crate::core::grouping::fingerprint_for;
use crate::core::{Document, EngineError, Fingerprint, LineId, RoundingMode, TagId, TaxId};

/// Amounts of one fingerprint, in document and company currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxDetail {
    pub base_amount_currency: Decimal,
    pub tax_amount_currency: Decimal,
    /// Company currency.
    pub base_amount: Decimal,
    /// Company currency.
    pub tax_amount: Decimal,
    pub tax: TaxId,
    pub tags: BTreeSet<TagId>,
}

impl TaxDetail {
    fn zero(tax: TaxId, tags: BTreeSet<TagId>) -> Self {
        Self {
            base_amount_currency: Decimal::ZERO,
            tax_amount_currency: Decimal::ZERO,
            base_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            tax,
            tags,
        }
    }
}

/// Tax details of every base line, keyed by fingerprint, in input order.
///
/// Amounts are rounded consistently with the line and company currencies
/// regardless of the document's rounding discipline, so consumers can
/// serialise them as-is.
pub fn tax_details_per_line(
    doc: &Document,
) -> Result<Vec<(LineId, BTreeMap<Fingerprint, TaxDetail>)>, EngineError> {
    let prepared = evaluate_document(doc)?;
    let mut out = Vec::with_capacity(prepared.len());
    for prep in &prepared {
        let mut details: BTreeMap<Fingerprint, TaxDetail> = BTreeMap::new();
        for entry in &prep.result.entries {
            let fingerprint = fingerprint_for(&prep.line, entry);
            let detail = details
                .entry(fingerprint)
                .or_insert_with(|| TaxDetail::zero(entry.tax, entry.tags.clone()));
            detail.base_amount_currency += entry.base;
            detail.tax_amount_currency += entry.amount;
            detail.base_amount += entry.company_base;
            detail.tax_amount += entry.company_amount;
        }
        // Per-line company rounding gaps fold into the company amount so
        // the details stay consistent with the emitted tax lines.
        for entry in &prep.result.rounding_gaps {
            let fingerprint = fingerprint_for(&prep.line, entry);
            if let Some(detail) = details.get_mut(&fingerprint) {
                detail.tax_amount += entry.company_amount;
            }
        }
        if doc.rounding == RoundingMode::Global {
            for detail in details.values_mut() {
                detail.base_amount_currency = prep.line.currency.round(detail.base_amount_currency);
                detail.tax_amount_currency = prep.line.currency.round(detail.tax_amount_currency);
                detail.base_amount = doc.company_currency.round(detail.base_amount);
                detail.tax_amount = doc.company_currency.round(detail.tax_amount);
            }
        }
        out.push((prep.line.id, details));
    }
    Ok(out)
}

/// Document-level aggregate of [`tax_details_per_line`], summed over
/// lines per fingerprint.
pub fn tax_details(doc: &Document) -> Result<BTreeMap<Fingerprint, TaxDetail>, EngineError> {
    let mut out: BTreeMap<Fingerprint, TaxDetail> = BTreeMap::new();
    for (_, details) in tax_details_per_line(doc)? {
        for (fingerprint, detail) in details {
            match out.entry(fingerprint) {
                Entry::Vacant(slot) => {
                    slot.insert(detail);
                }
                Entry::Occupied(mut slot) => {
                    let aggregate = slot.get_mut();
                    aggregate.base_amount_currency += detail.base_amount_currency;
                    aggregate.tax_amount_currency += detail.tax_amount_currency;
                    aggregate.base_amount += detail.base_amount;
                    aggregate.tax_amount += detail.tax_amount;
                }
            }
        }
    }
    Ok(out)
}
