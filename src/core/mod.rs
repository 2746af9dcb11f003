//! Core tax engine: data model, per-line evaluation, grouping, diffing
//! and the document driver.
//!
//! Everything here is a value object constructed per call; the engine
//! keeps no state between calls and performs no I/O.

mod builder;
mod diff;
pub(crate) mod document;
mod error;
mod evaluate;
pub(crate) mod grouping;
mod money;
mod tax;
mod types;

pub use builder::*;
pub use diff::*;
pub use document::Document;
pub use error::*;
pub use evaluate::{EvalContext, LineTaxResult, RepartitionEntry, evaluate_line};
pub use grouping::{DesiredTaxLine, SlotKind, fingerprint_for};
pub use money::*;
pub use tax::{flatten, validate_taxes};
pub use types::*;
