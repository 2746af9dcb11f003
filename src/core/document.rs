//! Document driver: classification, fiscal-position mapping, refund
//! inference, orchestration of the per-line evaluation, and totals.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::diff::{BaseLineUpdate, DiffResult, Totals, diff};
use super::error::{EngineError, Warning};
use super::evaluate::{EvalContext, LineTaxResult, evaluate_line, unwrap_price_included};
use super::grouping::SlotTable;
use super::money::{Currency, RoundingMode};
use super::tax::flatten;
use super::types::{
    BaseLine, DocumentKind, DocumentTypeCode, ExistingTaxLine, JournalKind, TagId, Tax, TaxAmount,
    TaxUse,
};

/// A whole accounting document handed to the engine. Every referenced
/// value (currency rates, fiscal positions, tag twins) is resolved by
/// the embedder beforehand; the engine performs no lookups and no I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub kind: DocumentKind,
    pub company_currency: Currency,
    pub rounding: RoundingMode,
    pub lines: Vec<BaseLine>,
    pub existing_tax_lines: Vec<ExistingTaxLine>,
    /// Symmetric pairs of opposite-sign report tags, consulted when the
    /// document direction calls for tag inversion.
    pub tag_twins: BTreeMap<TagId, TagId>,
}

impl Document {
    pub fn is_outbound(&self) -> bool {
        matches!(self.kind, DocumentKind::Sale { .. })
    }

    /// Document type exposed to EDI consumers; miscellaneous entries
    /// have none.
    pub fn type_code(&self) -> Option<DocumentTypeCode> {
        match self.kind {
            DocumentKind::Sale { refund: false } => Some(DocumentTypeCode::Invoice),
            DocumentKind::Sale { refund: true } => Some(DocumentTypeCode::CreditNote),
            DocumentKind::Purchase { refund: false } => Some(DocumentTypeCode::Bill),
            DocumentKind::Purchase { refund: true } => Some(DocumentTypeCode::RefundBill),
            DocumentKind::Misc { .. } => None,
        }
    }

    /// Run the engine: evaluate every line, group, and diff against the
    /// persisted tax lines.
    pub fn compute(&self) -> Result<DiffResult, EngineError> {
        compute(self)
    }
}

pub(crate) struct PreparedLine {
    /// Effective line: fiscal position applied, price re-wrapped.
    pub line: BaseLine,
    pub result: LineTaxResult,
}

/// Evaluate every base line with its document-level context applied.
pub(crate) fn evaluate_document(doc: &Document) -> Result<Vec<PreparedLine>, EngineError> {
    let mut out = Vec::with_capacity(doc.lines.len());
    for line in &doc.lines {
        let mut effective = line.clone();
        if let Some(position) = &line.fiscal_position {
            let mapped = position.map_taxes(&line.taxes);
            if mapped != line.taxes {
                effective.price_unit =
                    price_unit_after_mapping(&line.taxes, &mapped, line.price_unit)?;
                effective.taxes = mapped;
            }
        }
        let is_refund = line_is_refund(doc.kind, &effective);
        let ctx = EvalContext {
            company_currency: &doc.company_currency,
            rounding: doc.rounding,
            is_refund,
            invert_tags: invert_tags(doc.kind, is_refund),
            tag_twins: &doc.tag_twins,
            handle_price_include: true,
        };
        let result = evaluate_line(&effective, &ctx)?;
        out.push(PreparedLine {
            line: effective,
            result,
        });
    }
    Ok(out)
}

fn compute(doc: &Document) -> Result<DiffResult, EngineError> {
    let prepared = evaluate_document(doc)?;

    let mut slots = SlotTable::default();
    let mut base_line_updates = Vec::with_capacity(prepared.len());
    let mut untaxed = Decimal::ZERO;
    let mut currencies: BTreeSet<&str> = BTreeSet::new();

    for prep in &prepared {
        slots.add_line(&prep.line, &prep.result);
        base_line_updates.push(BaseLineUpdate {
            line: prep.line.id,
            base_tags: prep.result.base_tags.clone(),
            tax_exigible: prep.result.tax_exigible,
        });
        untaxed += prep.line.currency.round(prep.result.total_excluded);
        currencies.insert(prep.line.currency.code.as_str());
    }

    let desired = slots.finish(doc.rounding, &doc.company_currency);
    let mut tax_total: Decimal = desired.iter().map(|slot| slot.amount).sum();

    let outcome = diff(desired, &doc.existing_tax_lines);
    tax_total += outcome.preserved_difference_total;

    let mut warnings = outcome.warnings;
    let totals = if currencies.len() <= 1 {
        Some(Totals {
            amount_untaxed: untaxed,
            amount_tax: tax_total,
            amount_total: untaxed + tax_total,
        })
    } else {
        warnings.push(Warning::MultipleCurrencies);
        None
    };

    Ok(DiffResult {
        to_create: outcome.to_create,
        to_update: outcome.to_update,
        to_delete: outcome.to_delete,
        base_line_updates,
        totals,
        warnings,
    })
}

/// Refund direction of one line. Fixed at document scope for invoices
/// and bills; inferred from the amount sign for journal entries so that
/// manual entries reconcile with the generated tax reports.
fn line_is_refund(kind: DocumentKind, line: &BaseLine) -> bool {
    match kind {
        DocumentKind::Sale { refund } | DocumentKind::Purchase { refund } => refund,
        DocumentKind::Misc { journal } => match journal {
            JournalKind::Sale if uses(&line.taxes, TaxUse::Sale) => {
                line.price_unit <= Decimal::ZERO
            }
            JournalKind::Purchase if uses(&line.taxes, TaxUse::Purchase) => {
                line.price_unit > Decimal::ZERO
            }
            _ => false,
        },
    }
}

fn uses(taxes: &[Tax], which: TaxUse) -> bool {
    taxes.iter().any(|tax| match &tax.amount {
        TaxAmount::Group(children) => uses(children, which),
        _ => tax.tax_use == which,
    })
}

/// Report tags are stored with the sign of the tax report line; entries
/// on the sale path of a non-refund document (or the purchase path of a
/// refund) swap to the negated twin.
fn invert_tags(kind: DocumentKind, is_refund: bool) -> bool {
    match kind {
        DocumentKind::Sale { .. }
        | DocumentKind::Misc {
            journal: JournalKind::Sale,
        } => !is_refund,
        DocumentKind::Purchase { .. }
        | DocumentKind::Misc {
            journal: JournalKind::Purchase,
        } => is_refund,
        DocumentKind::Misc {
            journal: JournalKind::General,
        } => false,
    }
}

/// Recompute the displayed unit price when fiscal-position mapping
/// changes a tax set containing price-included taxes: unwrap with the
/// original set, then fold only the mapped price-included taxes back in.
fn price_unit_after_mapping(
    original: &[Tax],
    mapped: &[Tax],
    price_unit: Decimal,
) -> Result<Decimal, EngineError> {
    let original_flat = flatten(original)?;
    let mapped_flat = flatten(mapped)?;
    if !original_flat.iter().any(|t| t.price_include)
        && !mapped_flat.iter().any(|t| t.price_include)
    {
        return Ok(price_unit);
    }

    let excluded = unwrap_price_included(&original_flat, price_unit)?;

    let mut affected = excluded;
    let mut price = excluded;
    for tax in &mapped_flat {
        let base = if tax.is_base_affected || tax.price_include {
            affected
        } else {
            excluded
        };
        let amount = tax.amount_on(base, Decimal::ONE);
        if tax.price_include {
            price += amount;
        }
        if tax.include_base_amount {
            affected += amount;
        }
    }
    Ok(price)
}
