use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::Currency;

/// Identifier of a tax definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaxId(pub u32);

/// Identifier of a repartition line within a tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepartitionId(pub u32);

/// Identifier of a ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u32);

/// Identifier of a partner (customer or vendor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartnerId(pub u32);

/// Identifier of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u32);

/// Identifier of a document line — base lines and tax lines share the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId(pub u32);

/// Identifier of a tax-report tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(pub u32);

/// Identifier of an analytic account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnalyticAccountId(pub u32);

/// Identifier of an analytic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnalyticTagId(pub u32);

/// Identifier of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub u32);

/// How a tax derives its amount from the taxable base.
///
/// Group taxes carry their ordered children in place; [`flatten`] expands
/// them before any evaluation, so the evaluator itself never sees `Group`.
///
/// [`flatten`]: crate::core::flatten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaxAmount {
    /// Rate `r`: yields `base * r / 100`.
    Percent(Decimal),
    /// Amount `a` per unit: yields `a * quantity`, independent of price.
    Fixed(Decimal),
    /// Rate `r`: yields `base * r / (100 - r)` — the price already contains
    /// the tax as a division.
    Division(Decimal),
    /// Expands in place to its ordered children.
    Group(Vec<Tax>),
}

/// When the tax becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exigibility {
    /// Due when the document is issued.
    OnInvoice,
    /// Due when payment is received (cash basis).
    OnPayment,
}

/// Which document side a tax applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxUse {
    Sale,
    Purchase,
    None,
}

/// Whether a repartition line splits the taxable base or the tax amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepartitionKind {
    Base,
    Tax,
}

/// A rule within a tax splitting its amount (or tagging its base) into
/// sub-amounts with optional accounts and tag sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepartitionLine {
    pub id: RepartitionId,
    /// Share of the tax amount, in percent. Tax-kind factors of one list
    /// must sum to 100 (possibly split across several lines).
    pub factor_percent: Decimal,
    pub kind: RepartitionKind,
    /// Account receiving the sub-amount; falls back to the base line's
    /// account when absent.
    pub account: Option<AccountId>,
    /// Tax-report tags stamped on the emitted amount.
    pub tags: BTreeSet<TagId>,
    pub use_in_tax_closing: bool,
}

impl RepartitionLine {
    /// A base-kind line carrying the given report tags.
    pub fn base(id: u32, tags: impl IntoIterator<Item = u32>) -> Self {
        Self {
            id: RepartitionId(id),
            factor_percent: Decimal::ONE_HUNDRED,
            kind: RepartitionKind::Base,
            account: None,
            tags: tags.into_iter().map(TagId).collect(),
            use_in_tax_closing: false,
        }
    }

    /// A tax-kind line receiving `factor_percent` of the tax amount.
    pub fn tax(id: u32, factor_percent: Decimal) -> Self {
        Self {
            id: RepartitionId(id),
            factor_percent,
            kind: RepartitionKind::Tax,
            account: None,
            tags: BTreeSet::new(),
            use_in_tax_closing: true,
        }
    }

    pub fn with_account(mut self, account: u32) -> Self {
        self.account = Some(AccountId(account));
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = u32>) -> Self {
        self.tags = tags.into_iter().map(TagId).collect();
        self
    }
}

/// In-memory tax definition.
///
/// A value object: the engine receives fully resolved taxes and never
/// looks anything up. Fiscal-position mapping is still pending at this
/// point; the document driver applies it before evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub id: TaxId,
    pub name: String,
    pub amount: TaxAmount,
    /// The tax is already contained in the displayed unit price and must
    /// be unwrapped to obtain the taxable base.
    pub price_include: bool,
    /// This tax's amount enters the base of subsequent base-affected taxes.
    pub include_base_amount: bool,
    /// This tax's base picks up amounts of preceding base-including taxes.
    pub is_base_affected: bool,
    pub invoice_repartition: Vec<RepartitionLine>,
    pub refund_repartition: Vec<RepartitionLine>,
    pub exigibility: Exigibility,
    /// Emitted tax lines carry the base line's analytic distribution.
    pub analytic: bool,
    pub tax_use: TaxUse,
    pub company: Option<CompanyId>,
}

impl Tax {
    /// The repartition list for the given document direction.
    pub fn repartition(&self, refund: bool) -> &[RepartitionLine] {
        if refund {
            &self.refund_repartition
        } else {
            &self.invoice_repartition
        }
    }
}

/// A mapping from one source tax to its replacement list. An empty
/// replacement removes the tax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxMapping {
    pub src: TaxId,
    pub dst: Vec<Tax>,
}

/// Partner/company-dependent substitution of taxes, resolved by the
/// embedder and applied per line by the document driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalPosition {
    pub name: String,
    pub mappings: Vec<TaxMapping>,
}

impl FiscalPosition {
    /// Apply the mapping to an ordered tax list. Unmapped taxes pass
    /// through unchanged; mapped taxes are spliced in place.
    pub fn map_taxes(&self, taxes: &[Tax]) -> Vec<Tax> {
        let mut out = Vec::with_capacity(taxes.len());
        for tax in taxes {
            match self.mappings.iter().find(|m| m.src == tax.id) {
                Some(mapping) => out.extend(mapping.dst.iter().cloned()),
                None => out.push(tax.clone()),
            }
        }
        out
    }
}

/// A product or service line contributing a taxable amount to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLine {
    pub id: LineId,
    pub product: Option<ProductId>,
    pub quantity: Decimal,
    /// Unit price before discount, signed in the document's natural
    /// direction (a debit on a sale journal arrives negative).
    pub price_unit: Decimal,
    /// Percent discount in `[0, 100]`.
    pub discount: Decimal,
    /// Ordered, cascade-respecting tax list.
    pub taxes: Vec<Tax>,
    pub partner: Option<PartnerId>,
    pub currency: Currency,
    /// Document-currency units per one company-currency unit. Required
    /// when the line currency differs from the company currency.
    pub rate: Option<Decimal>,
    pub date: NaiveDate,
    pub account: Option<AccountId>,
    pub analytic_account: Option<AnalyticAccountId>,
    pub analytic_tags: BTreeSet<AnalyticTagId>,
    pub fiscal_position: Option<FiscalPosition>,
}

/// The grouping key identifying one tax line. Two repartition amounts
/// with the same fingerprint merge into one tax line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub repartition: RepartitionId,
    pub account: Option<AccountId>,
    pub partner: Option<PartnerId>,
    /// ISO 4217 code of the amount currency.
    pub currency: String,
    pub analytic_account: Option<AnalyticAccountId>,
    pub analytic_tags: BTreeSet<AnalyticTagId>,
    /// Following taxes whose base was enlarged by this tax's amount.
    pub parent_taxes: BTreeSet<TaxId>,
    pub tags: BTreeSet<TagId>,
}

/// A previously persisted tax line, loaded by the embedder and keyed by
/// fingerprint. The only state the engine sees across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingTaxLine {
    pub id: LineId,
    pub fingerprint: Fingerprint,
    /// Company-currency amount.
    pub balance: Decimal,
    /// Document-currency amount.
    pub amount_currency: Decimal,
    pub tax_base_amount: Decimal,
    pub tags: BTreeSet<TagId>,
    pub exigible: bool,
}

impl ExistingTaxLine {
    pub fn repartition(&self) -> RepartitionId {
        self.fingerprint.repartition
    }
}

/// Journal behind a miscellaneous entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalKind {
    Sale,
    Purchase,
    General,
}

/// Document classification driving repartition choice and tag inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Customer-facing document (outbound).
    Sale { refund: bool },
    /// Vendor-facing document (inbound).
    Purchase { refund: bool },
    /// Manual journal entry; the refund direction is inferred per line.
    Misc { journal: JournalKind },
}

/// Document type exposed to EDI consumers, derived from direction and
/// refund flag. Miscellaneous entries have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentTypeCode {
    Invoice,
    CreditNote,
    Bill,
    RefundBill,
}

impl DocumentTypeCode {
    /// Stable wire identifier.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::CreditNote => "credit_note",
            Self::Bill => "bill",
            Self::RefundBill => "refund_bill",
        }
    }
}
