//! Scalar values carried by the request context
//!
//! The `Scalar` enum is the closed set of value types matchers operate on.
//! Coercion between representations is explicit per matcher; the helpers
//! here implement the shared casts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// A single context value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    /// Signed integer (ids, amounts in minor units)
    Int(i64),
    /// UTF-8 string (keys, enum-like tags)
    Str(String),
    /// Exact decimal number (amounts)
    Decimal(Decimal),
    /// UTC timestamp (naive inputs are interpreted as UTC upstream)
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    /// Convert a JSON value into a scalar.
    ///
    /// Integral numbers become `Int`; other numbers are parsed through their
    /// textual form into `Decimal` so no binary-float rounding leaks in.
    /// Booleans, nulls, arrays and objects are not scalars.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else {
                    Decimal::from_str(&n.to_string()).ok().map(Scalar::Decimal)
                }
            }
            serde_json::Value::String(s) => Some(Scalar::Str(s.clone())),
            _ => None,
        }
    }

    /// String-cast then integer-parse, the `coerce: "int"` rule.
    ///
    /// `Int` passes through; `Str` must parse as a whole number. Decimals and
    /// timestamps never cast to integers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Str(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Exact-decimal view of the scalar, the `coerce: "decimal"` rule.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Scalar::Int(i) => Some(Decimal::from(*i)),
            Scalar::Str(s) => Decimal::from_str(s.trim()).ok(),
            Scalar::Decimal(d) => Some(*d),
            Scalar::Timestamp(_) => None,
        }
    }

    /// Timestamp view; only `Timestamp` qualifies.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Scalar::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Canonical string form, the `coerce: "str"` rule.
    ///
    /// This is also the byte source for sticky hashing, so it must stay
    /// frozen: integers in plain decimal, decimals via `Decimal`'s display,
    /// timestamps in RFC 3339.
    pub fn display_string(&self) -> String {
        match self {
            Scalar::Int(i) => i.to_string(),
            Scalar::Str(s) => s.clone(),
            Scalar::Decimal(d) => d.to_string(),
            Scalar::Timestamp(ts) => ts.to_rfc3339(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<Decimal> for Scalar {
    fn from(v: Decimal) -> Self {
        Scalar::Decimal(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Scalar::Timestamp(v)
    }
}
