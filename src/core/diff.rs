//! Diffing the desired tax-line set against the persisted one.
//!
//! Never fails for data reasons: malformed inputs are rejected upstream,
//! and user edits surface as preserved difference lines plus a warning.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::Warning;
use super::grouping::{DesiredTaxLine, SlotKind};
use super::types::{ExistingTaxLine, Fingerprint, LineId, TagId};

/// New values for an existing tax line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLineUpdate {
    pub line: LineId,
    pub tax_base_amount: Decimal,
    /// Document-currency amount.
    pub amount: Decimal,
    /// Company-currency amount.
    pub balance: Decimal,
    pub exigible: bool,
}

/// Refreshed per-base-line attributes, emitted for every base line even
/// when unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLineUpdate {
    pub line: LineId,
    pub base_tags: BTreeSet<TagId>,
    pub tax_exigible: bool,
}

/// Document totals; omitted when more than one currency contributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub amount_untaxed: Decimal,
    pub amount_tax: Decimal,
    pub amount_total: Decimal,
}

/// Command stream reconciling the persisted tax lines with the computed
/// ones, plus refreshed base-line attributes and totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Fingerprint-sorted, so repeated runs are byte-identical.
    pub to_create: Vec<DesiredTaxLine>,
    pub to_update: Vec<TaxLineUpdate>,
    pub to_delete: Vec<LineId>,
    pub base_line_updates: Vec<BaseLineUpdate>,
    pub totals: Option<Totals>,
    pub warnings: Vec<Warning>,
}

pub(crate) struct DiffOutcome {
    pub to_create: Vec<DesiredTaxLine>,
    pub to_update: Vec<TaxLineUpdate>,
    pub to_delete: Vec<LineId>,
    /// Document-currency sum of preserved manual difference lines; counts
    /// into the document's tax total.
    pub preserved_difference_total: Decimal,
    pub warnings: Vec<Warning>,
}

#[derive(Default)]
struct Bucket<'a> {
    target: Option<&'a ExistingTaxLine>,
    differences: VecDeque<&'a ExistingTaxLine>,
    matched: bool,
}

/// Compare desired slots against existing tax lines.
///
/// The first existing line per fingerprint is the computed target.
/// Further lines with a zero base are difference lines (manual edits or
/// earlier rounding gaps); any other duplicate is deleted outright.
pub(crate) fn diff(desired: Vec<DesiredTaxLine>, existing: &[ExistingTaxLine]) -> DiffOutcome {
    let mut buckets: BTreeMap<&Fingerprint, Bucket<'_>> = BTreeMap::new();
    let mut to_delete = Vec::new();

    for line in existing {
        let bucket = buckets.entry(&line.fingerprint).or_default();
        if bucket.target.is_none() {
            bucket.target = Some(line);
        } else if line.tax_base_amount.is_zero() {
            bucket.differences.push_back(line);
        } else {
            to_delete.push(line.id);
        }
    }

    let mut to_create = Vec::new();
    let mut to_update = Vec::new();

    for slot in desired {
        let bucket = buckets.get_mut(&slot.fingerprint);
        let existing_line = match (&slot.kind, bucket) {
            (SlotKind::Computed, Some(bucket)) => {
                bucket.matched = true;
                bucket.target.take()
            }
            (SlotKind::Difference, Some(bucket)) => bucket.differences.pop_front(),
            (_, None) => None,
        };
        match existing_line {
            Some(line) if values_match(line, &slot) => {}
            Some(line) => to_update.push(TaxLineUpdate {
                line: line.id,
                tax_base_amount: slot.tax_base_amount,
                amount: slot.amount,
                balance: slot.balance,
                exigible: slot.exigible,
            }),
            None => to_create.push(slot),
        }
    }

    // Leftovers: unmatched targets go away; difference lines survive only
    // while their computed sibling still exists.
    let mut preserved_difference_total = Decimal::ZERO;
    let mut warnings = Vec::new();
    for (fingerprint, bucket) in buckets {
        if let Some(line) = bucket.target {
            to_delete.push(line.id);
        }
        for line in bucket.differences {
            if bucket.matched {
                preserved_difference_total += line.amount_currency;
                warnings.push(Warning::ManualTaxOverride {
                    fingerprint: fingerprint.clone(),
                    amount: line.amount_currency,
                });
            } else {
                to_delete.push(line.id);
            }
        }
    }

    DiffOutcome {
        to_create,
        to_update,
        to_delete,
        preserved_difference_total,
        warnings,
    }
}

fn values_match(existing: &ExistingTaxLine, slot: &DesiredTaxLine) -> bool {
    existing.tax_base_amount == slot.tax_base_amount
        && existing.amount_currency == slot.amount
        && existing.balance == slot.balance
        && existing.exigible == slot.exigible
}
