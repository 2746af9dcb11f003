//! # fiskal
//!
//! Per-document tax computation and reconciliation engine: cascading
//! taxes, price-included unwrapping, repartition, dual rounding
//! disciplines, and diffing against persisted tax lines.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating
//! point. The engine is a pure library: it takes plain structured inputs
//! and returns a command stream, suitable for embedding behind any
//! persistence layer.
//!
//! ## Quick Start
//!
//! ```rust
//! use fiskal::core::*;
//! use rust_decimal_macros::dec;
//!
//! let vat = TaxBuilder::percent(1, "VAT 19%", dec!(19)).build();
//! let doc = DocumentBuilder::invoice()
//!     .add_line(BaseLineBuilder::new(1, dec!(1), dec!(100)).tax(vat).build())
//!     .build();
//!
//! let result = doc.compute().unwrap();
//! assert_eq!(result.to_create.len(), 1);
//! assert_eq!(result.to_create[0].amount, dec!(19));
//!
//! let totals = result.totals.unwrap();
//! assert_eq!(totals.amount_untaxed, dec!(100));
//! assert_eq!(totals.amount_tax, dec!(19));
//! assert_eq!(totals.amount_total, dec!(119));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Tax model, base-line evaluator, diff engine, document driver |
//! | `details` | Read-side per-line and per-document tax detail aggregates |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "details")]
pub mod details;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
