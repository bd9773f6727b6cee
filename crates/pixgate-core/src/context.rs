//! Request context consumed by matchers and the selector
//!
//! The context is a read-only mapping from dotted-path field names to
//! scalars, produced upstream of the selector. Which fields are required
//! depends on the rules enabled in the active snapshot; matchers treat
//! absent fields as non-matching, never as errors.

use crate::hash::fnv1a64;
use crate::scalar::Scalar;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Well-known context field names.
pub mod fields {
    pub const API_USER_ID: &str = "api_user_id";
    pub const PIX_KEY: &str = "pix_key";
    pub const PIX_KEY_TYPE: &str = "pix_key_type";
    pub const AMOUNT: &str = "amount";
    pub const NOW: &str = "now";
}

/// Read-only request context.
///
/// Keys are dotted-path field names (`"api_user_id"`,
/// `"payload.metadata.channel"`); values are [`Scalar`]s. Lookups on unknown
/// paths read as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestCtx {
    values: HashMap<String, Scalar>,
}

impl RequestCtx {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary field.
    pub fn with_field(mut self, path: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.values.insert(path.into(), value.into());
        self
    }

    /// Set the API user id.
    pub fn with_api_user_id(self, id: i64) -> Self {
        self.with_field(fields::API_USER_ID, id)
    }

    /// Set the PIX key.
    pub fn with_pix_key(self, key: impl Into<String>) -> Self {
        self.with_field(fields::PIX_KEY, key.into())
    }

    /// Set the PIX key type tag.
    pub fn with_pix_key_type(self, key_type: impl Into<String>) -> Self {
        self.with_field(fields::PIX_KEY_TYPE, key_type.into())
    }

    /// Set the amount (integer minor units or a decimal scalar).
    pub fn with_amount(self, amount: impl Into<Scalar>) -> Self {
        self.with_field(fields::AMOUNT, amount)
    }

    /// Override "now" for evaluation (tests, simulations).
    pub fn with_now(self, now: DateTime<Utc>) -> Self {
        self.with_field(fields::NOW, now)
    }

    /// Look up a field by its dotted-path name.
    pub fn lookup(&self, path: &str) -> Option<&Scalar> {
        self.values.get(path)
    }

    /// The evaluation-time override, if the caller supplied one.
    pub fn now(&self) -> Option<DateTime<Utc>> {
        self.values.get(fields::NOW).and_then(Scalar::as_timestamp)
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field names present, in unspecified order.
    ///
    /// Names are safe to log; values are not.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Stable fingerprint of the field *names* present in this context.
    ///
    /// Field values never participate, so the fingerprint is safe to emit in
    /// decision events. Keys are sorted and joined with `,` before hashing,
    /// making the result independent of insertion order.
    pub fn key_fingerprint(&self) -> u64 {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        fnv1a64(keys.join(",").as_bytes())
    }
}
