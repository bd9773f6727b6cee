//! Amount range matcher
//!
//! Compares an amount field against exact-decimal bounds. Integer inputs are
//! interpreted as minor units and rescaled by `10^scale`; decimal inputs are
//! parsed from their textual form. No binary-float arithmetic anywhere.

use crate::context::RequestCtx;
use rust_decimal::Decimal;

/// How to read the raw amount out of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountCoerce {
    /// Integer minor units, divided by `10^scale`
    Int,
    /// Exact decimal parsed from the value's textual form
    Decimal,
}

/// Matches when the amount falls within `[min, max]` under the configured
/// inclusivity.
#[derive(Debug, Clone)]
pub struct AmountRangeMatcher {
    field: String,
    coerce: AmountCoerce,
    scale: u32,
    min: Option<Decimal>,
    max: Option<Decimal>,
    min_inclusive: bool,
    max_inclusive: bool,
}

impl AmountRangeMatcher {
    /// Build from compile-time-parsed bounds.
    ///
    /// The compiler guarantees `min <= max` when both are present and
    /// `scale` fits the decimal precision.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        field: impl Into<String>,
        coerce: AmountCoerce,
        scale: u32,
        min: Option<Decimal>,
        max: Option<Decimal>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Self {
        Self {
            field: field.into(),
            coerce,
            scale,
            min,
            max,
            min_inclusive,
            max_inclusive,
        }
    }

    /// The context field this matcher reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn matches(&self, ctx: &RequestCtx) -> bool {
        let Some(raw) = ctx.lookup(&self.field) else {
            return false;
        };
        let amount = match self.coerce {
            AmountCoerce::Int => match raw.as_int() {
                Some(iv) => Decimal::new(iv, self.scale),
                None => return false,
            },
            AmountCoerce::Decimal => match raw.to_decimal() {
                Some(d) => d,
                None => return false,
            },
        };

        if let Some(min) = self.min {
            let below = if self.min_inclusive {
                amount < min
            } else {
                amount <= min
            };
            if below {
                return false;
            }
        }
        if let Some(max) = self.max {
            let above = if self.max_inclusive {
                amount > max
            } else {
                amount >= max
            };
            if above {
                return false;
            }
        }
        true
    }
}
