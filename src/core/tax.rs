//! Tax definition handling: group flattening, amount formulas, and
//! load-time validation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::EngineError;
use super::types::{RepartitionKind, RepartitionLine, Tax, TaxAmount, TaxId};

/// Expand group taxes in place to their ordered children.
///
/// Stable, order-preserving, and idempotent: flattening an already flat
/// list returns it unchanged. A cyclic group is rejected rather than
/// recursed into.
pub fn flatten(taxes: &[Tax]) -> Result<Vec<Tax>, EngineError> {
    let mut out = Vec::with_capacity(taxes.len());
    let mut path = Vec::new();
    for tax in taxes {
        flatten_into(tax, &mut out, &mut path)?;
    }
    Ok(out)
}

fn flatten_into(tax: &Tax, out: &mut Vec<Tax>, path: &mut Vec<TaxId>) -> Result<(), EngineError> {
    if path.contains(&tax.id) {
        return Err(EngineError::InvalidTax(format!(
            "group cycle through '{}'",
            tax.name
        )));
    }
    match &tax.amount {
        TaxAmount::Group(children) => {
            path.push(tax.id);
            for child in children {
                flatten_into(child, out, path)?;
            }
            path.pop();
        }
        _ => out.push(tax.clone()),
    }
    Ok(())
}

/// Validate a flattened tax list before evaluation.
pub fn validate_taxes(taxes: &[Tax]) -> Result<(), EngineError> {
    for tax in taxes {
        match tax.amount {
            TaxAmount::Division(rate) => {
                if rate < Decimal::ZERO || rate >= dec!(100) {
                    return Err(EngineError::InvalidTax(format!(
                        "'{}': division rate must be in [0, 100), got {rate}",
                        tax.name
                    )));
                }
            }
            TaxAmount::Percent(rate) => {
                if tax.price_include && rate <= dec!(-100) {
                    return Err(EngineError::InvalidTax(format!(
                        "'{}': price-included percent rate must exceed -100, got {rate}",
                        tax.name
                    )));
                }
            }
            TaxAmount::Fixed(_) => {}
            TaxAmount::Group(_) => {
                return Err(EngineError::InvalidTax(format!(
                    "'{}': group tax not flattened",
                    tax.name
                )));
            }
        }
        validate_repartition(tax, &tax.invoice_repartition, "invoice")?;
        validate_repartition(tax, &tax.refund_repartition, "refund")?;
    }
    Ok(())
}

fn validate_repartition(
    tax: &Tax,
    lines: &[RepartitionLine],
    which: &str,
) -> Result<(), EngineError> {
    let mut factor_sum = Decimal::ZERO;
    for line in lines {
        if line.factor_percent < Decimal::ZERO || line.factor_percent > dec!(100) {
            return Err(EngineError::InvalidTax(format!(
                "'{}': {which} repartition factor must be in [0, 100], got {}",
                tax.name, line.factor_percent
            )));
        }
        if line.kind == RepartitionKind::Tax {
            factor_sum += line.factor_percent;
        }
    }
    if factor_sum != dec!(100) {
        return Err(EngineError::InvalidTax(format!(
            "'{}': {which} tax repartition factors sum to {factor_sum}, expected 100",
            tax.name
        )));
    }
    Ok(())
}

impl Tax {
    /// Amount produced on `base`, before repartition.
    pub(crate) fn amount_on(&self, base: Decimal, quantity: Decimal) -> Decimal {
        match self.amount {
            TaxAmount::Percent(rate) => base * rate / dec!(100),
            TaxAmount::Fixed(amount) => amount * quantity,
            TaxAmount::Division(rate) => {
                if rate >= dec!(100) {
                    Decimal::ZERO
                } else {
                    base * rate / (dec!(100) - rate)
                }
            }
            // Groups are flattened away before evaluation.
            TaxAmount::Group(_) => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Exigibility, TaxUse};

    fn leaf(id: u32, amount: TaxAmount) -> Tax {
        Tax {
            id: TaxId(id),
            name: format!("T{id}"),
            amount,
            price_include: false,
            include_base_amount: false,
            is_base_affected: true,
            invoice_repartition: vec![
                RepartitionLine::base(id * 10 + 1, []),
                RepartitionLine::tax(id * 10 + 2, dec!(100)),
            ],
            refund_repartition: vec![
                RepartitionLine::base(id * 10 + 3, []),
                RepartitionLine::tax(id * 10 + 4, dec!(100)),
            ],
            exigibility: Exigibility::OnInvoice,
            analytic: false,
            tax_use: TaxUse::Sale,
            company: None,
        }
    }

    fn group(id: u32, children: Vec<Tax>) -> Tax {
        let mut tax = leaf(id, TaxAmount::Group(children));
        tax.invoice_repartition.clear();
        tax.refund_repartition.clear();
        tax
    }

    #[test]
    fn flatten_preserves_order() {
        let taxes = vec![
            leaf(1, TaxAmount::Percent(dec!(19))),
            group(
                9,
                vec![
                    leaf(2, TaxAmount::Percent(dec!(7))),
                    leaf(3, TaxAmount::Fixed(dec!(1))),
                ],
            ),
            leaf(4, TaxAmount::Percent(dec!(5))),
        ];

        let flat = flatten(&taxes).unwrap();
        let ids: Vec<u32> = flat.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn flatten_is_idempotent() {
        let taxes = vec![
            leaf(1, TaxAmount::Percent(dec!(19))),
            leaf(2, TaxAmount::Fixed(dec!(2))),
        ];
        let once = flatten(&taxes).unwrap();
        let twice = flatten(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn flatten_rejects_cycles() {
        // A nested group reusing the outer group's id.
        let inner = group(9, vec![leaf(1, TaxAmount::Percent(dec!(19)))]);
        let cyclic = group(9, vec![inner]);
        assert!(matches!(
            flatten(&[cyclic]),
            Err(EngineError::InvalidTax(_))
        ));
    }

    #[test]
    fn factors_must_sum_to_100() {
        let mut tax = leaf(1, TaxAmount::Percent(dec!(19)));
        tax.invoice_repartition = vec![
            RepartitionLine::base(11, []),
            RepartitionLine::tax(12, dec!(40)),
            RepartitionLine::tax(13, dec!(40)),
        ];
        assert!(matches!(
            validate_taxes(&[tax]),
            Err(EngineError::InvalidTax(_))
        ));
    }

    #[test]
    fn split_factors_summing_to_100_pass() {
        let mut tax = leaf(1, TaxAmount::Percent(dec!(19)));
        tax.invoice_repartition = vec![
            RepartitionLine::base(11, []),
            RepartitionLine::tax(12, dec!(40)),
            RepartitionLine::tax(13, dec!(60)),
        ];
        assert!(validate_taxes(&[tax]).is_ok());
    }

    #[test]
    fn division_rate_bounds() {
        let tax = leaf(1, TaxAmount::Division(dec!(100)));
        assert!(matches!(
            validate_taxes(&[tax]),
            Err(EngineError::InvalidTax(_))
        ));
        let tax = leaf(1, TaxAmount::Division(dec!(20)));
        assert!(validate_taxes(&[tax]).is_ok());
    }

    #[test]
    fn amount_formulas() {
        let percent = leaf(1, TaxAmount::Percent(dec!(19)));
        assert_eq!(percent.amount_on(dec!(100), dec!(1)), dec!(19));

        let fixed = leaf(2, TaxAmount::Fixed(dec!(15)));
        assert_eq!(fixed.amount_on(dec!(999), dec!(3)), dec!(45));

        let division = leaf(3, TaxAmount::Division(dec!(20)));
        assert_eq!(division.amount_on(dec!(80), dec!(1)), dec!(20));
    }
}
