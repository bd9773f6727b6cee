//! Regular-expression matcher
//!
//! The pattern is compiled once at ruleset compile time. `match` and
//! `fullmatch` modes are realized by anchoring the pattern (`\A(?:...)`,
//! `\A(?:...)\z`) so the hot path is always a single `is_match`. Inputs
//! longer than `max_len` characters are rejected before the engine runs.

use crate::context::RequestCtx;
use crate::scalar::Scalar;
use regex::Regex;

/// Where in the input the pattern must land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexMode {
    /// Anywhere in the string
    Search,
    /// At the start of the string
    Match,
    /// The entire string
    FullMatch,
}

/// String coercion applied before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrCoerce {
    /// Force the canonical string form
    Str,
    /// Force the canonical string form, lowercased
    LowerStr,
    /// No coercion: non-string scalars never match
    None,
}

/// Matches when `ctx[field]`, viewed as a string, satisfies the pattern.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    field: String,
    /// Pattern as declared, before anchoring (kept for telemetry)
    source: String,
    regex: Regex,
    mode: RegexMode,
    coerce: StrCoerce,
    max_len: usize,
}

impl RegexMatcher {
    /// Build from an already-compiled (anchored) regex.
    ///
    /// The compiler guarantees `regex` reflects `source` anchored for
    /// `mode`, and `max_len >= 1`.
    pub fn new(
        field: impl Into<String>,
        source: impl Into<String>,
        regex: Regex,
        mode: RegexMode,
        coerce: StrCoerce,
        max_len: usize,
    ) -> Self {
        Self {
            field: field.into(),
            source: source.into(),
            regex,
            mode,
            coerce,
            max_len,
        }
    }

    /// The context field this matcher reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The declared (unanchored) pattern.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluation mode.
    pub fn mode(&self) -> RegexMode {
        self.mode
    }

    /// Input-length ceiling, in characters.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn matches(&self, ctx: &RequestCtx) -> bool {
        let Some(value) = ctx.lookup(&self.field) else {
            return false;
        };
        let text = match self.coerce {
            StrCoerce::Str => value.display_string(),
            StrCoerce::LowerStr => value.display_string().to_lowercase(),
            StrCoerce::None => match value {
                Scalar::Str(s) => s.clone(),
                _ => return false,
            },
        };
        // Bound the scan itself: counting stops at max_len + 1 characters.
        if text.chars().take(self.max_len + 1).count() > self.max_len {
            return false;
        }
        self.regex.is_match(&text)
    }
}
