//! Currency-aware rounding.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating
//! point. A currency rounds to the nearest multiple of its rounding step
//! (commercial rounding, ties away from zero); the step defaults to
//! `10^-decimal_places`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Document-level rounding discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Each repartition amount is rounded per base line before it enters
    /// any aggregate; cascaded bases see the rounded running total.
    PerLine,
    /// Amounts accumulate at full precision; rounding happens once, when
    /// a tax line's final amount and base are emitted.
    Global,
}

/// A resolved currency: code, precision and rounding step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code, e.g. "EUR".
    pub code: String,
    pub decimal_places: u32,
    /// Strictly positive. `round()` snaps to the nearest multiple.
    pub rounding_step: Decimal,
}

impl Currency {
    /// A currency rounding to `decimal_places`, step `10^-decimal_places`.
    pub fn new(code: impl Into<String>, decimal_places: u32) -> Self {
        Self {
            code: code.into(),
            decimal_places,
            rounding_step: Decimal::new(1, decimal_places),
        }
    }

    /// A currency with a non-canonical step, e.g. cash rounding to 0.05.
    pub fn with_rounding_step(code: impl Into<String>, decimal_places: u32, step: Decimal) -> Self {
        Self {
            code: code.into(),
            decimal_places,
            rounding_step: step,
        }
    }

    /// Round to the nearest multiple of the rounding step, ties away
    /// from zero.
    pub fn round(&self, value: Decimal) -> Decimal {
        if self.rounding_step == Decimal::new(1, self.decimal_places) {
            value.round_dp_with_strategy(self.decimal_places, RoundingStrategy::MidpointAwayFromZero)
        } else {
            let steps = (value / self.rounding_step)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            steps * self.rounding_step
        }
    }

    /// Whether `value` is already a multiple of the rounding step.
    pub fn is_rounded(&self, value: Decimal) -> bool {
        self.round(value) == value
    }
}
