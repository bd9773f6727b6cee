//! Whitelist membership matcher
//!
//! Checks whether a context field, after an optional coercion, belongs to a
//! set of allowed values. The set is pre-coerced at compile time so the hot
//! path is one lookup plus one hash.

use crate::context::RequestCtx;
use crate::scalar::Scalar;
use std::collections::HashSet;

/// Precompiled membership set, already in the coerced domain.
#[derive(Debug, Clone)]
pub enum MemberSet {
    /// `coerce: "int"` — members and candidates cast through string→integer
    Ints(HashSet<i64>),
    /// `coerce: "str"` — members and candidates forced to strings
    Strs(HashSet<String>),
    /// `coerce: "lower-str"` — as `Strs`, lowercased
    LowerStrs(HashSet<String>),
    /// No coercion — raw scalar equality
    Raw(HashSet<Scalar>),
}

/// Matches when `ctx[field]`, coerced, is a member of the set.
#[derive(Debug, Clone)]
pub struct ValueInMatcher {
    field: String,
    set: MemberSet,
}

impl ValueInMatcher {
    /// Build from a field path and a pre-coerced member set.
    ///
    /// The compiler guarantees the set is non-empty and homogeneous with the
    /// declared coercion.
    pub fn new(field: impl Into<String>, set: MemberSet) -> Self {
        Self {
            field: field.into(),
            set,
        }
    }

    /// The context field this matcher reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn matches(&self, ctx: &RequestCtx) -> bool {
        let Some(value) = ctx.lookup(&self.field) else {
            return false;
        };
        match &self.set {
            MemberSet::Ints(set) => match value.as_int() {
                Some(i) => set.contains(&i),
                None => false,
            },
            MemberSet::Strs(set) => set.contains(&value.display_string()),
            MemberSet::LowerStrs(set) => set.contains(&value.display_string().to_lowercase()),
            MemberSet::Raw(set) => set.contains(value),
        }
    }
}
