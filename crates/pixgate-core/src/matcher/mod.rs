//! Compiled matcher tree
//!
//! A matcher is a pure predicate over the request context. The tree is built
//! once by the compiler and then shared immutably between concurrent
//! selections; evaluation holds no mutable state and never fails — any
//! missing or uncoercible field reads as a non-match.
//!
//! Combinators short-circuit: `All` stops at the first false child, `Any` at
//! the first true one. `NoneOf` is true when every child is false. The
//! constant variants exist as fold targets for the compiler (an empty `all`
//! list folds to `ConstTrue`, an empty `any` to `ConstFalse`).

mod amount_range;
mod debug;
mod regex;
mod time_window;
mod value_in;

pub use self::amount_range::{AmountCoerce, AmountRangeMatcher};
pub use self::debug::DebugMatcher;
pub use self::regex::{RegexMatcher, RegexMode, StrCoerce};
pub use self::time_window::{DaySet, TimeWindowMatcher};
pub use self::value_in::{MemberSet, ValueInMatcher};

use crate::context::RequestCtx;
use chrono::{DateTime, Utc};

/// A compiled boolean predicate over the request context.
///
/// `now` is resolved once per selection by the caller and threaded through
/// so that a single evaluation observes a single instant.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Membership of a (coerced) context field in a precompiled set
    ValueIn(ValueInMatcher),
    /// Regular-expression match on a string field
    Regex(RegexMatcher),
    /// Exact-decimal range check on an amount field
    AmountRange(AmountRangeMatcher),
    /// Time-of-day window in a fixed timezone
    TimeWindow(TimeWindowMatcher),
    /// Short-circuit AND over children
    All(Vec<Matcher>),
    /// Short-circuit OR over children
    Any(Vec<Matcher>),
    /// True iff every child is false
    NoneOf(Vec<Matcher>),
    /// Always true (constant-fold target)
    ConstTrue,
    /// Always false (constant-fold target)
    ConstFalse,
    /// Telemetry decorator around an inner matcher
    Debug(DebugMatcher),
}

impl Matcher {
    /// Evaluate this matcher against `ctx` at instant `now`.
    pub fn matches(&self, ctx: &RequestCtx, now: DateTime<Utc>) -> bool {
        match self {
            Matcher::ValueIn(m) => m.matches(ctx),
            Matcher::Regex(m) => m.matches(ctx),
            Matcher::AmountRange(m) => m.matches(ctx),
            Matcher::TimeWindow(m) => m.matches(now),
            Matcher::All(children) => children.iter().all(|c| c.matches(ctx, now)),
            Matcher::Any(children) => children.iter().any(|c| c.matches(ctx, now)),
            Matcher::NoneOf(children) => !children.iter().any(|c| c.matches(ctx, now)),
            Matcher::ConstTrue => true,
            Matcher::ConstFalse => false,
            Matcher::Debug(m) => m.matches(ctx, now),
        }
    }

    /// Short tag naming the matcher kind, used in debug telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Matcher::ValueIn(_) => "VALUE_IN",
            Matcher::Regex(_) => "REGEX",
            Matcher::AmountRange(_) => "AMOUNT_RANGE",
            Matcher::TimeWindow(_) => "TIME_WINDOW",
            Matcher::All(_) => "ALL",
            Matcher::Any(_) => "ANY",
            Matcher::NoneOf(_) => "NONE",
            Matcher::ConstTrue => "CONST_TRUE",
            Matcher::ConstFalse => "CONST_FALSE",
            Matcher::Debug(_) => "DEBUG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> Matcher {
        Matcher::ConstTrue
    }

    fn f() -> Matcher {
        Matcher::ConstFalse
    }

    fn eval(m: &Matcher) -> bool {
        m.matches(&RequestCtx::new(), Utc::now())
    }

    #[test]
    fn test_all_semantics() {
        assert!(eval(&Matcher::All(vec![])));
        assert!(eval(&Matcher::All(vec![t(), t()])));
        assert!(!eval(&Matcher::All(vec![t(), f()])));
    }

    #[test]
    fn test_any_semantics() {
        assert!(!eval(&Matcher::Any(vec![])));
        assert!(eval(&Matcher::Any(vec![f(), t()])));
        assert!(!eval(&Matcher::Any(vec![f(), f()])));
    }

    #[test]
    fn test_none_semantics() {
        // NONE([]) is vacuously true
        assert!(eval(&Matcher::NoneOf(vec![])));
        // NONE([m]) == !m
        assert!(eval(&Matcher::NoneOf(vec![f()])));
        assert!(!eval(&Matcher::NoneOf(vec![t()])));
        // NONE([m1, m2]) == !m1 && !m2
        assert!(eval(&Matcher::NoneOf(vec![f(), f()])));
        assert!(!eval(&Matcher::NoneOf(vec![f(), t()])));
        assert!(!eval(&Matcher::NoneOf(vec![t(), t()])));
    }

    #[test]
    fn test_nested_composition() {
        // ALL[ANY[f, t], NONE[f]] => true
        let m = Matcher::All(vec![
            Matcher::Any(vec![f(), t()]),
            Matcher::NoneOf(vec![f()]),
        ]);
        assert!(eval(&m));
    }
}
