use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::document::Document;
use super::money::{Currency, RoundingMode};
use super::types::*;

/// Builder for tax definitions.
///
/// The convenience constructors derive a default repartition from the
/// tax id: base line `id*10+1` and a single 100% tax line `id*10+2` on
/// the invoice side, `id*10+3` / `id*10+4` on the refund side.
///
/// ```
/// use fiskal::core::*;
/// use rust_decimal_macros::dec;
///
/// let vat = TaxBuilder::percent(1, "VAT 19%", dec!(19)).build();
/// assert_eq!(vat.invoice_repartition.len(), 2);
/// ```
pub struct TaxBuilder {
    id: TaxId,
    name: String,
    amount: TaxAmount,
    price_include: bool,
    include_base_amount: bool,
    is_base_affected: bool,
    invoice_repartition: Vec<RepartitionLine>,
    refund_repartition: Vec<RepartitionLine>,
    exigibility: Exigibility,
    analytic: bool,
    tax_use: TaxUse,
    company: Option<CompanyId>,
}

impl TaxBuilder {
    fn new(id: u32, name: impl Into<String>, amount: TaxAmount) -> Self {
        Self {
            id: TaxId(id),
            name: name.into(),
            amount,
            price_include: false,
            include_base_amount: false,
            is_base_affected: true,
            invoice_repartition: vec![
                RepartitionLine::base(id * 10 + 1, []),
                RepartitionLine::tax(id * 10 + 2, Decimal::ONE_HUNDRED),
            ],
            refund_repartition: vec![
                RepartitionLine::base(id * 10 + 3, []),
                RepartitionLine::tax(id * 10 + 4, Decimal::ONE_HUNDRED),
            ],
            exigibility: Exigibility::OnInvoice,
            analytic: false,
            tax_use: TaxUse::Sale,
            company: None,
        }
    }

    pub fn percent(id: u32, name: impl Into<String>, rate: Decimal) -> Self {
        Self::new(id, name, TaxAmount::Percent(rate))
    }

    pub fn fixed(id: u32, name: impl Into<String>, amount: Decimal) -> Self {
        Self::new(id, name, TaxAmount::Fixed(amount))
    }

    pub fn division(id: u32, name: impl Into<String>, rate: Decimal) -> Self {
        Self::new(id, name, TaxAmount::Division(rate))
    }

    /// A group tax expanding to its ordered children; carries no
    /// repartition of its own.
    pub fn group(id: u32, name: impl Into<String>, children: Vec<Tax>) -> Self {
        let mut builder = Self::new(id, name, TaxAmount::Group(children));
        builder.invoice_repartition.clear();
        builder.refund_repartition.clear();
        builder
    }

    pub fn price_include(mut self) -> Self {
        self.price_include = true;
        self
    }

    pub fn include_base_amount(mut self) -> Self {
        self.include_base_amount = true;
        self
    }

    pub fn not_base_affected(mut self) -> Self {
        self.is_base_affected = false;
        self
    }

    pub fn exigible_on_payment(mut self) -> Self {
        self.exigibility = Exigibility::OnPayment;
        self
    }

    pub fn analytic(mut self) -> Self {
        self.analytic = true;
        self
    }

    pub fn tax_use(mut self, tax_use: TaxUse) -> Self {
        self.tax_use = tax_use;
        self
    }

    pub fn company(mut self, id: u32) -> Self {
        self.company = Some(CompanyId(id));
        self
    }

    pub fn invoice_repartition(mut self, lines: Vec<RepartitionLine>) -> Self {
        self.invoice_repartition = lines;
        self
    }

    pub fn refund_repartition(mut self, lines: Vec<RepartitionLine>) -> Self {
        self.refund_repartition = lines;
        self
    }

    pub fn build(self) -> Tax {
        Tax {
            id: self.id,
            name: self.name,
            amount: self.amount,
            price_include: self.price_include,
            include_base_amount: self.include_base_amount,
            is_base_affected: self.is_base_affected,
            invoice_repartition: self.invoice_repartition,
            refund_repartition: self.refund_repartition,
            exigibility: self.exigibility,
            analytic: self.analytic,
            tax_use: self.tax_use,
            company: self.company,
        }
    }
}

/// Builder for base lines. Currency defaults to EUR (2 decimal places),
/// the date to the epoch.
pub struct BaseLineBuilder {
    id: LineId,
    product: Option<ProductId>,
    quantity: Decimal,
    price_unit: Decimal,
    discount: Decimal,
    taxes: Vec<Tax>,
    partner: Option<PartnerId>,
    currency: Currency,
    rate: Option<Decimal>,
    date: NaiveDate,
    account: Option<AccountId>,
    analytic_account: Option<AnalyticAccountId>,
    analytic_tags: BTreeSet<AnalyticTagId>,
    fiscal_position: Option<FiscalPosition>,
}

impl BaseLineBuilder {
    pub fn new(id: u32, quantity: Decimal, price_unit: Decimal) -> Self {
        Self {
            id: LineId(id),
            product: None,
            quantity,
            price_unit,
            discount: Decimal::ZERO,
            taxes: Vec::new(),
            partner: None,
            currency: Currency::new("EUR", 2),
            rate: None,
            date: NaiveDate::default(),
            account: None,
            analytic_account: None,
            analytic_tags: BTreeSet::new(),
            fiscal_position: None,
        }
    }

    pub fn product(mut self, id: u32) -> Self {
        self.product = Some(ProductId(id));
        self
    }

    pub fn discount(mut self, percent: Decimal) -> Self {
        self.discount = percent;
        self
    }

    pub fn tax(mut self, tax: Tax) -> Self {
        self.taxes.push(tax);
        self
    }

    pub fn taxes(mut self, taxes: Vec<Tax>) -> Self {
        self.taxes = taxes;
        self
    }

    pub fn partner(mut self, id: u32) -> Self {
        self.partner = Some(PartnerId(id));
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Document-currency units per one company-currency unit.
    pub fn rate(mut self, rate: Decimal) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn account(mut self, id: u32) -> Self {
        self.account = Some(AccountId(id));
        self
    }

    pub fn analytic_account(mut self, id: u32) -> Self {
        self.analytic_account = Some(AnalyticAccountId(id));
        self
    }

    pub fn analytic_tags(mut self, tags: impl IntoIterator<Item = u32>) -> Self {
        self.analytic_tags = tags.into_iter().map(AnalyticTagId).collect();
        self
    }

    pub fn fiscal_position(mut self, position: FiscalPosition) -> Self {
        self.fiscal_position = Some(position);
        self
    }

    pub fn build(self) -> BaseLine {
        BaseLine {
            id: self.id,
            product: self.product,
            quantity: self.quantity,
            price_unit: self.price_unit,
            discount: self.discount,
            taxes: self.taxes,
            partner: self.partner,
            currency: self.currency,
            rate: self.rate,
            date: self.date,
            account: self.account,
            analytic_account: self.analytic_account,
            analytic_tags: self.analytic_tags,
            fiscal_position: self.fiscal_position,
        }
    }
}

/// Builder for whole documents.
///
/// ```
/// use fiskal::core::*;
/// use rust_decimal_macros::dec;
///
/// let vat = TaxBuilder::percent(1, "VAT 19%", dec!(19)).build();
/// let doc = DocumentBuilder::invoice()
///     .add_line(BaseLineBuilder::new(1, dec!(1), dec!(100)).tax(vat).build())
///     .build();
/// assert_eq!(doc.type_code(), Some(DocumentTypeCode::Invoice));
/// ```
pub struct DocumentBuilder {
    kind: DocumentKind,
    company_currency: Currency,
    rounding: RoundingMode,
    lines: Vec<BaseLine>,
    existing_tax_lines: Vec<ExistingTaxLine>,
    tag_twins: BTreeMap<TagId, TagId>,
}

impl DocumentBuilder {
    fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            company_currency: Currency::new("EUR", 2),
            rounding: RoundingMode::PerLine,
            lines: Vec::new(),
            existing_tax_lines: Vec::new(),
            tag_twins: BTreeMap::new(),
        }
    }

    pub fn invoice() -> Self {
        Self::new(DocumentKind::Sale { refund: false })
    }

    pub fn credit_note() -> Self {
        Self::new(DocumentKind::Sale { refund: true })
    }

    pub fn bill() -> Self {
        Self::new(DocumentKind::Purchase { refund: false })
    }

    pub fn refund_bill() -> Self {
        Self::new(DocumentKind::Purchase { refund: true })
    }

    pub fn misc(journal: JournalKind) -> Self {
        Self::new(DocumentKind::Misc { journal })
    }

    pub fn company_currency(mut self, currency: Currency) -> Self {
        self.company_currency = currency;
        self
    }

    pub fn rounding(mut self, mode: RoundingMode) -> Self {
        self.rounding = mode;
        self
    }

    pub fn add_line(mut self, line: BaseLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn existing_tax_line(mut self, line: ExistingTaxLine) -> Self {
        self.existing_tax_lines.push(line);
        self
    }

    /// Register opposite-sign tag pairs; each pair is inserted in both
    /// directions.
    pub fn tag_twins(mut self, pairs: impl IntoIterator<Item = (u32, u32)>) -> Self {
        for (a, b) in pairs {
            self.tag_twins.insert(TagId(a), TagId(b));
            self.tag_twins.insert(TagId(b), TagId(a));
        }
        self
    }

    pub fn build(self) -> Document {
        Document {
            kind: self.kind,
            company_currency: self.company_currency,
            rounding: self.rounding,
            lines: self.lines,
            existing_tax_lines: self.existing_tax_lines,
            tag_twins: self.tag_twins,
        }
    }
}
