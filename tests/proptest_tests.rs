//! Property-based tests for the engine's universal invariants.

use fiskal::core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn tax_pool() -> Vec<Tax> {
    vec![
        TaxBuilder::percent(1, "VAT 19%", dec!(19)).build(),
        TaxBuilder::percent(2, "VAT 7%", dec!(7)).build(),
        TaxBuilder::fixed(3, "eco fee", dec!(2.50)).build(),
        TaxBuilder::percent(4, "VAT 10% incl.", dec!(10))
            .price_include()
            .build(),
        TaxBuilder::percent(5, "surcharge 5% cascading", dec!(5))
            .include_base_amount()
            .build(),
    ]
}

/// Quantity 1-20, price 0.01-9999.99, one tax from the pool.
fn arb_line() -> impl Strategy<Value = BaseLine> {
    (1u32..=20, 1i64..1_000_000, 0usize..5).prop_map(|(quantity, cents, tax_idx)| {
        BaseLineBuilder::new(1, Decimal::from(quantity), Decimal::new(cents, 2))
            .tax(tax_pool()[tax_idx].clone())
            .build()
    })
}

fn arb_lines() -> impl Strategy<Value = Vec<BaseLine>> {
    prop::collection::vec(arb_line(), 1..=5).prop_map(|mut lines| {
        for (i, line) in lines.iter_mut().enumerate() {
            line.id = LineId(i as u32 + 1);
        }
        lines
    })
}

fn invoice(lines: Vec<BaseLine>, mode: RoundingMode) -> Document {
    let mut builder = DocumentBuilder::invoice().rounding(mode);
    for line in lines {
        builder = builder.add_line(line);
    }
    builder.build()
}

fn persist(result: &DiffResult) -> Vec<ExistingTaxLine> {
    result
        .to_create
        .iter()
        .enumerate()
        .map(|(i, slot)| ExistingTaxLine {
            id: LineId(1000 + i as u32),
            fingerprint: slot.fingerprint.clone(),
            balance: slot.balance,
            amount_currency: slot.amount,
            tax_base_amount: slot.tax_base_amount,
            tags: slot.tags.clone(),
            exigible: slot.exigible,
        })
        .collect()
}

proptest! {
    /// amount_untaxed + amount_tax = amount_total whenever defined.
    #[test]
    fn totals_are_coherent(lines in arb_lines()) {
        for mode in [RoundingMode::PerLine, RoundingMode::Global] {
            let result = invoice(lines.clone(), mode).compute().unwrap();
            let totals = result.totals.unwrap();
            prop_assert_eq!(
                totals.amount_untaxed + totals.amount_tax,
                totals.amount_total
            );
        }
    }

    /// On a fresh document, the created amounts sum to the tax total.
    #[test]
    fn created_amounts_sum_to_tax_total(lines in arb_lines()) {
        for mode in [RoundingMode::PerLine, RoundingMode::Global] {
            let result = invoice(lines.clone(), mode).compute().unwrap();
            let created: Decimal = result.to_create.iter().map(|s| s.amount).sum();
            prop_assert_eq!(created, result.totals.unwrap().amount_tax);
        }
    }

    /// Permuting base lines changes only base_line_updates order, not the
    /// emitted tax-line set.
    #[test]
    fn permuting_lines_is_stable(lines in arb_lines()) {
        let forward = invoice(lines.clone(), RoundingMode::PerLine).compute().unwrap();
        let mut reversed_lines = lines;
        reversed_lines.reverse();
        let reversed = invoice(reversed_lines, RoundingMode::PerLine).compute().unwrap();
        prop_assert_eq!(forward.to_create, reversed.to_create);
    }

    /// Applying the command stream reaches a fixed point: the second run
    /// has nothing left to do.
    #[test]
    fn applying_output_reaches_fixed_point(lines in arb_lines()) {
        for mode in [RoundingMode::PerLine, RoundingMode::Global] {
            let doc = invoice(lines.clone(), mode);
            let first = doc.compute().unwrap();

            let mut applied = doc.clone();
            applied.existing_tax_lines = persist(&first);
            let second = applied.compute().unwrap();

            prop_assert!(second.to_create.is_empty(), "creates: {:?}", second.to_create);
            prop_assert!(second.to_update.is_empty(), "updates: {:?}", second.to_update);
            prop_assert!(second.to_delete.is_empty(), "deletes: {:?}", second.to_delete);
        }
    }

    /// Reversing the document direction swaps repartition sides but
    /// leaves the amounts untouched.
    #[test]
    fn reversal_keeps_amounts(lines in arb_lines()) {
        let sale = invoice(lines.clone(), RoundingMode::PerLine).compute().unwrap();
        let mut builder = DocumentBuilder::credit_note();
        for line in lines {
            builder = builder.add_line(line);
        }
        let refund = builder.build().compute().unwrap();

        let mut sale_amounts: Vec<Decimal> = sale.to_create.iter().map(|s| s.amount).collect();
        let mut refund_amounts: Vec<Decimal> = refund.to_create.iter().map(|s| s.amount).collect();
        sale_amounts.sort();
        refund_amounts.sort();
        prop_assert_eq!(sale_amounts, refund_amounts);
    }

    /// The two rounding disciplines agree up to per-line rounding error.
    #[test]
    fn rounding_disciplines_agree_within_tolerance(lines in arb_lines()) {
        let line_count = Decimal::from(lines.len());
        let per_line = invoice(lines.clone(), RoundingMode::PerLine).compute().unwrap();
        let global = invoice(lines, RoundingMode::Global).compute().unwrap();

        let a = per_line.totals.unwrap().amount_tax;
        let b = global.totals.unwrap().amount_tax;
        prop_assert!(
            (a - b).abs() <= dec!(0.02) * line_count,
            "per-line {a} vs global {b}"
        );
    }
}
