use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use fiskal::core::*;

fn standard_taxes() -> Vec<Tax> {
    vec![
        TaxBuilder::percent(1, "VAT 19%", dec!(19)).build(),
        TaxBuilder::percent(2, "VAT 10% incl.", dec!(10))
            .price_include()
            .include_base_amount()
            .build(),
        TaxBuilder::fixed(3, "eco fee", dec!(0.25)).build(),
    ]
}

fn build_document(lines: u32) -> Document {
    let taxes = standard_taxes();
    let mut builder = DocumentBuilder::invoice();
    for i in 1..=lines {
        let tax = taxes[(i % 3) as usize].clone();
        builder = builder.add_line(
            BaseLineBuilder::new(i, dec!(2), dec!(49.95))
                .tax(tax)
                .partner(7)
                .account(4000)
                .build(),
        );
    }
    builder.build()
}

fn bench_compute_10_lines(c: &mut Criterion) {
    let doc = build_document(10);
    c.bench_function("compute_10_lines", |b| {
        b.iter(|| black_box(black_box(&doc).compute()));
    });
}

fn bench_compute_1000_lines(c: &mut Criterion) {
    let doc = build_document(1000);
    c.bench_function("compute_1000_lines", |b| {
        b.iter(|| black_box(black_box(&doc).compute()));
    });
}

fn bench_recompute_after_apply(c: &mut Criterion) {
    let doc = build_document(100);
    let first = doc.compute().unwrap();
    let mut applied = doc.clone();
    applied.existing_tax_lines = first
        .to_create
        .iter()
        .enumerate()
        .map(|(i, slot)| ExistingTaxLine {
            id: LineId(10_000 + i as u32),
            fingerprint: slot.fingerprint.clone(),
            balance: slot.balance,
            amount_currency: slot.amount,
            tax_base_amount: slot.tax_base_amount,
            tags: slot.tags.clone(),
            exigible: slot.exigible,
        })
        .collect();

    c.bench_function("recompute_100_lines_applied", |b| {
        b.iter(|| black_box(black_box(&applied).compute()));
    });
}

fn bench_evaluate_single_cascade(c: &mut Criterion) {
    let line = BaseLineBuilder::new(1, dec!(3), dec!(121))
        .taxes(standard_taxes())
        .build();
    let company = Currency::new("EUR", 2);
    let twins = std::collections::BTreeMap::new();
    let ctx = EvalContext {
        company_currency: &company,
        rounding: RoundingMode::PerLine,
        is_refund: false,
        invert_tags: false,
        tag_twins: &twins,
        handle_price_include: true,
    };

    c.bench_function("evaluate_cascade_line", |b| {
        b.iter(|| black_box(evaluate_line(black_box(&line), black_box(&ctx))));
    });
}

criterion_group!(
    benches,
    bench_compute_10_lines,
    bench_compute_1000_lines,
    bench_recompute_after_apply,
    bench_evaluate_single_cascade,
);
criterion_main!(benches);
