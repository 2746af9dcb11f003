//! Base-line evaluation: price-included unwrap, cascade walk, repartition
//! expansion, base tags, exigibility.
//!
//! One call evaluates one base line against its flattened tax list. The
//! document driver decides the refund direction, tag inversion and
//! rounding discipline and passes them in via [`EvalContext`].

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::money::{Currency, RoundingMode};
use super::tax::{flatten, validate_taxes};
use super::types::{
    AccountId, BaseLine, Exigibility, RepartitionId, RepartitionKind, RepartitionLine, TagId, Tax,
    TaxAmount, TaxId,
};

/// One tagged sub-amount produced by a tax repartition line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepartitionEntry {
    pub tax: TaxId,
    pub repartition: RepartitionId,
    pub account: Option<AccountId>,
    /// Taxable base, document currency.
    pub base: Decimal,
    /// Tax sub-amount, document currency.
    pub amount: Decimal,
    /// Taxable base, company currency.
    pub company_base: Decimal,
    /// Tax sub-amount, company currency.
    pub company_amount: Decimal,
    pub tags: BTreeSet<TagId>,
    pub parent_taxes: BTreeSet<TaxId>,
    pub exigible: bool,
    pub analytic: bool,
}

/// Everything the evaluator needs beyond the base line itself; assembled
/// by the document driver.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub company_currency: &'a Currency,
    pub rounding: RoundingMode,
    pub is_refund: bool,
    /// Swap report tags with their negated-sign twins.
    pub invert_tags: bool,
    pub tag_twins: &'a BTreeMap<TagId, TagId>,
    /// Disabled by the driver's fiscal-position re-wrap pass.
    pub handle_price_include: bool,
}

/// Result of evaluating one base line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTaxResult {
    /// Taxable subtotal after unwrapping price-included taxes.
    pub total_excluded: Decimal,
    /// Subtotal plus every tax amount.
    pub total_included: Decimal,
    pub entries: Vec<RepartitionEntry>,
    /// Company-currency rounding gaps (per-line mode with a foreign
    /// currency only); same shape as entries, zero bases.
    pub rounding_gaps: Vec<RepartitionEntry>,
    /// Report tags for the base line itself, from base-kind repartition.
    pub base_tags: BTreeSet<TagId>,
    /// False as soon as any tax on the line is due on payment.
    pub tax_exigible: bool,
}

/// Evaluate one base line: apply the discount, unwrap price-included
/// taxes, walk the cascade and expand each tax across its repartition
/// lines.
pub fn evaluate_line(line: &BaseLine, ctx: &EvalContext<'_>) -> Result<LineTaxResult, EngineError> {
    let flat = flatten(&line.taxes)?;
    validate_taxes(&flat)?;
    validate_line(line, &flat)?;

    let rate = resolve_rate(line, ctx)?;
    let per_line = ctx.rounding == RoundingMode::PerLine;

    let price_unit = line.price_unit * (dec!(100) - line.discount) / dec!(100);
    let excluded_unit = if ctx.handle_price_include {
        unwrap_price_included(&flat, price_unit)?
    } else {
        price_unit
    };

    let mut base = excluded_unit * line.quantity;
    if per_line {
        base = line.currency.round(base);
    }
    let total_excluded = base;

    // Followers whose base each base-including tax enlarges.
    let parents: Vec<BTreeSet<TaxId>> = flat
        .iter()
        .enumerate()
        .map(|(i, tax)| {
            if tax.include_base_amount {
                flat[i + 1..]
                    .iter()
                    .filter(|t| t.is_base_affected)
                    .map(|t| t.id)
                    .collect()
            } else {
                BTreeSet::new()
            }
        })
        .collect();

    let mut affected_base = total_excluded;
    let mut entries = Vec::new();
    let mut rounding_gaps = Vec::new();
    let mut total_tax = Decimal::ZERO;

    for (i, tax) in flat.iter().enumerate() {
        // Taxes opted out of the cascade keep seeing the raw subtotal.
        let tax_base = if tax.is_base_affected || tax.price_include {
            affected_base
        } else {
            total_excluded
        };
        let mut amount = tax.amount_on(tax_base, line.quantity);
        if per_line {
            amount = line.currency.round(amount);
        }

        let reps: Vec<&RepartitionLine> = tax
            .repartition(ctx.is_refund)
            .iter()
            .filter(|r| r.kind == RepartitionKind::Tax)
            .collect();

        // Pro-rata split; the last line absorbs the rounding remainder so
        // the parts sum to the tax amount exactly.
        let mut parts = Vec::with_capacity(reps.len());
        if per_line {
            let mut allocated = Decimal::ZERO;
            for (k, rep) in reps.iter().enumerate() {
                let part = if k + 1 == reps.len() {
                    amount - allocated
                } else {
                    line.currency.round(amount * rep.factor_percent / dec!(100))
                };
                allocated += part;
                parts.push(part);
            }
        } else {
            for rep in &reps {
                parts.push(amount * rep.factor_percent / dec!(100));
            }
        }

        let company_base = convert(tax_base, rate, ctx.company_currency, per_line);
        let exigible = tax.exigibility == Exigibility::OnInvoice;
        let mut company_parts_sum = Decimal::ZERO;
        for (rep, part) in reps.iter().zip(&parts) {
            let company_amount = convert(*part, rate, ctx.company_currency, per_line);
            company_parts_sum += company_amount;
            entries.push(RepartitionEntry {
                tax: tax.id,
                repartition: rep.id,
                account: rep.account.or(line.account),
                base: tax_base,
                amount: *part,
                company_base,
                company_amount,
                tags: map_tags(&rep.tags, ctx),
                parent_taxes: parents[i].clone(),
                exigible,
                analytic: tax.analytic,
            });
        }

        // Converting each rounded part separately can leave the summed
        // company amounts off the converted total; the gap rides a
        // difference slot anchored at the remainder-carrying line.
        if per_line && line.currency.code != ctx.company_currency.code && !reps.is_empty() {
            let expected = ctx.company_currency.round(amount / rate);
            let gap = expected - company_parts_sum;
            if !gap.is_zero() {
                let last = reps[reps.len() - 1];
                rounding_gaps.push(RepartitionEntry {
                    tax: tax.id,
                    repartition: last.id,
                    account: last.account.or(line.account),
                    base: Decimal::ZERO,
                    amount: Decimal::ZERO,
                    company_base: Decimal::ZERO,
                    company_amount: gap,
                    tags: map_tags(&last.tags, ctx),
                    parent_taxes: parents[i].clone(),
                    exigible,
                    analytic: tax.analytic,
                });
            }
        }

        total_tax += amount;
        if tax.include_base_amount {
            affected_base += amount;
        }
    }

    let mut base_tags = BTreeSet::new();
    for tax in &flat {
        for rep in tax
            .repartition(ctx.is_refund)
            .iter()
            .filter(|r| r.kind == RepartitionKind::Base)
        {
            base_tags.extend(map_tags(&rep.tags, ctx));
        }
    }

    let tax_exigible = !flat.iter().any(|t| t.exigibility == Exigibility::OnPayment);

    Ok(LineTaxResult {
        total_excluded,
        total_included: total_excluded + total_tax,
        entries,
        rounding_gaps,
        base_tags,
        tax_exigible,
    })
}

/// Strip price-included taxes from a unit price, yielding the taxable
/// unit amount.
///
/// Walks the list in reverse: taxes later in the cascade sit on top of
/// earlier base-including ones, so each base-including boundary flushes
/// the rates accumulated so far before the walk continues beneath it.
pub(crate) fn unwrap_price_included(
    flat: &[Tax],
    price_unit: Decimal,
) -> Result<Decimal, EngineError> {
    let mut base = price_unit;
    let mut fixed = Decimal::ZERO;
    let mut percent = Decimal::ZERO;
    let mut division = Decimal::ZERO;

    for tax in flat.iter().rev() {
        if tax.include_base_amount {
            base = strip(base, fixed, percent, division)?;
            fixed = Decimal::ZERO;
            percent = Decimal::ZERO;
            division = Decimal::ZERO;
        }
        if tax.price_include {
            match tax.amount {
                TaxAmount::Percent(rate) => percent += rate,
                TaxAmount::Division(rate) => division += rate,
                TaxAmount::Fixed(amount) => fixed += amount,
                TaxAmount::Group(_) => {}
            }
        }
    }
    strip(base, fixed, percent, division)
}

fn strip(
    base: Decimal,
    fixed: Decimal,
    percent: Decimal,
    division: Decimal,
) -> Result<Decimal, EngineError> {
    if percent <= dec!(-100) {
        return Err(EngineError::InvalidTax(
            "price-included percent rates sum to -100% or below".into(),
        ));
    }
    if division >= dec!(100) {
        return Err(EngineError::InvalidTax(
            "price-included division rates sum to 100% or above".into(),
        ));
    }
    Ok((base - fixed) / (Decimal::ONE + percent / dec!(100)) * (dec!(100) - division) / dec!(100))
}

fn validate_line(line: &BaseLine, flat: &[Tax]) -> Result<(), EngineError> {
    if line.discount < Decimal::ZERO || line.discount > dec!(100) {
        return Err(EngineError::InvalidLine {
            line: line.id,
            reason: format!("discount must be in [0, 100], got {}", line.discount),
        });
    }
    if line.quantity < Decimal::ZERO
        && flat
            .iter()
            .any(|t| t.price_include && matches!(t.amount, TaxAmount::Fixed(_)))
    {
        return Err(EngineError::InvalidLine {
            line: line.id,
            reason: "negative quantity with a price-included fixed tax is unsupported".into(),
        });
    }
    Ok(())
}

fn resolve_rate(line: &BaseLine, ctx: &EvalContext<'_>) -> Result<Decimal, EngineError> {
    if line.currency.code == ctx.company_currency.code {
        return Ok(line.rate.unwrap_or(Decimal::ONE));
    }
    match line.rate {
        Some(rate) if rate > Decimal::ZERO => Ok(rate),
        _ => Err(EngineError::CurrencyMismatch {
            line: line.id,
            currency: line.currency.code.clone(),
        }),
    }
}

fn convert(value: Decimal, rate: Decimal, company: &Currency, round: bool) -> Decimal {
    let converted = value / rate;
    if round { company.round(converted) } else { converted }
}

fn map_tags(tags: &BTreeSet<TagId>, ctx: &EvalContext<'_>) -> BTreeSet<TagId> {
    if !ctx.invert_tags {
        return tags.clone();
    }
    // A tag without a twin is preserved as-is.
    tags.iter()
        .map(|tag| ctx.tag_twins.get(tag).copied().unwrap_or(*tag))
        .collect()
}
