//! Fingerprint derivation and aggregation of repartition amounts into
//! desired tax lines.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::evaluate::{LineTaxResult, RepartitionEntry};
use super::money::{Currency, RoundingMode};
use super::types::{
    AccountId, AnalyticAccountId, AnalyticTagId, BaseLine, Fingerprint, PartnerId, RepartitionId,
    TagId, TaxId,
};

/// Whether a desired tax line carries computed amounts or a residual
/// difference sharing another line's fingerprint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SlotKind {
    Computed,
    Difference,
}

/// A tax line the document should end up with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredTaxLine {
    pub fingerprint: Fingerprint,
    pub kind: SlotKind,
    pub tax: TaxId,
    pub repartition: RepartitionId,
    pub account: Option<AccountId>,
    pub partner: Option<PartnerId>,
    pub currency: Currency,
    pub analytic_account: Option<AnalyticAccountId>,
    pub analytic_tags: BTreeSet<AnalyticTagId>,
    pub parent_taxes: BTreeSet<TaxId>,
    pub tags: BTreeSet<TagId>,
    /// Sum of contributing taxable bases, document currency.
    pub tax_base_amount: Decimal,
    /// Tax amount, document currency.
    pub amount: Decimal,
    /// Tax amount, company currency.
    pub balance: Decimal,
    /// Taxable base, company currency.
    pub company_base: Decimal,
    pub exigible: bool,
}

/// Grouping key for one repartition amount.
pub fn fingerprint_for(line: &BaseLine, entry: &RepartitionEntry) -> Fingerprint {
    Fingerprint {
        repartition: entry.repartition,
        account: entry.account,
        partner: line.partner,
        currency: line.currency.code.clone(),
        analytic_account: if entry.analytic {
            line.analytic_account
        } else {
            None
        },
        analytic_tags: if entry.analytic {
            line.analytic_tags.clone()
        } else {
            BTreeSet::new()
        },
        parent_taxes: entry.parent_taxes.clone(),
        tags: entry.tags.clone(),
    }
}

/// Accumulates repartition amounts from all base lines into slots keyed
/// by fingerprint.
#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    computed: BTreeMap<Fingerprint, DesiredTaxLine>,
    differences: BTreeMap<Fingerprint, DesiredTaxLine>,
}

impl SlotTable {
    pub fn add_line(&mut self, line: &BaseLine, result: &LineTaxResult) {
        for entry in &result.entries {
            self.add(line, entry, SlotKind::Computed);
        }
        for entry in &result.rounding_gaps {
            self.add(line, entry, SlotKind::Difference);
        }
    }

    fn add(&mut self, line: &BaseLine, entry: &RepartitionEntry, kind: SlotKind) {
        let fingerprint = fingerprint_for(line, entry);
        let table = match kind {
            SlotKind::Computed => &mut self.computed,
            SlotKind::Difference => &mut self.differences,
        };
        let slot = table.entry(fingerprint.clone()).or_insert_with(|| DesiredTaxLine {
            fingerprint,
            kind,
            tax: entry.tax,
            repartition: entry.repartition,
            account: entry.account,
            partner: line.partner,
            currency: line.currency.clone(),
            analytic_account: if entry.analytic {
                line.analytic_account
            } else {
                None
            },
            analytic_tags: if entry.analytic {
                line.analytic_tags.clone()
            } else {
                BTreeSet::new()
            },
            parent_taxes: entry.parent_taxes.clone(),
            tags: entry.tags.clone(),
            tax_base_amount: Decimal::ZERO,
            amount: Decimal::ZERO,
            balance: Decimal::ZERO,
            company_base: Decimal::ZERO,
            exigible: entry.exigible,
        });
        slot.tax_base_amount += entry.base;
        slot.amount += entry.amount;
        slot.balance += entry.company_amount;
        slot.company_base += entry.company_base;
    }

    /// Emit the desired tax lines in fingerprint order, computed slots
    /// before difference slots on a shared fingerprint. Global mode
    /// rounds here — the single rounding point of that discipline.
    pub fn finish(self, mode: RoundingMode, company: &Currency) -> Vec<DesiredTaxLine> {
        let mut out: Vec<DesiredTaxLine> = self
            .computed
            .into_values()
            .chain(self.differences.into_values())
            .collect();
        if mode == RoundingMode::Global {
            for slot in &mut out {
                slot.tax_base_amount = slot.currency.round(slot.tax_base_amount);
                slot.amount = slot.currency.round(slot.amount);
                slot.balance = company.round(slot.balance);
                slot.company_base = company.round(slot.company_base);
            }
        }
        out.sort_by(|a, b| {
            a.fingerprint
                .cmp(&b.fingerprint)
                .then(a.kind.cmp(&b.kind))
        });
        out
    }
}
