use thiserror::Error;

use super::types::{Fingerprint, LineId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fatal errors raised by the engine. Warnings are never errors; they
/// ride on [`DiffResult::warnings`](super::diff::DiffResult).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Malformed tax definition — factors off 100, a division rate out of
    /// range, a cyclic group. The engine refuses to run.
    #[error("invalid tax: {0}")]
    InvalidTax(String),

    /// Malformed base line — discount out of `[0, 100]`, or a negative
    /// quantity combined with a price-included fixed tax.
    #[error("invalid base line {line:?}: {reason}")]
    InvalidLine { line: LineId, reason: String },

    /// A line is priced in a foreign currency but no conversion rate to
    /// the company currency was supplied.
    #[error("line {line:?} is in {currency} but no company-currency rate was supplied")]
    CurrencyMismatch { line: LineId, currency: String },
}

/// Non-fatal conditions surfaced alongside a normal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// More than one currency contributes; document totals are omitted.
    MultipleCurrencies,
    /// A user-edited difference line was found and preserved.
    ManualTaxOverride {
        fingerprint: Fingerprint,
        amount: Decimal,
    },
}
