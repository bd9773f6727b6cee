//! Decision events
//!
//! One event is emitted per selection through the registered hook. Events
//! carry identifiers, timing and a fingerprint of the context's field
//! *names* — never field values, so no PII (PIX keys, user ids) can leak
//! into logs or metrics sinks.

use std::fmt;
use std::sync::Arc;

/// Kind tag of a [`Decision`](crate::Decision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKind {
    /// A rule routed to a gateway
    Routed,
    /// A rule denied the payout
    Denied,
    /// The default gateway was used
    Defaulted,
    /// No rule matched and no default is configured
    NoMatch,
}

impl DecisionKind {
    /// Stable snake_case tag for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Routed => "routed",
            DecisionKind::Denied => "denied",
            DecisionKind::Defaulted => "defaulted",
            DecisionKind::NoMatch => "no_match",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-PII metadata describing one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionEvent {
    /// Id of the snapshot that served the selection
    pub ruleset_id: i64,
    /// Version of that snapshot
    pub version: i64,
    /// Rule that decided, when one matched
    pub rule_id: Option<i64>,
    /// Outcome kind
    pub kind: DecisionKind,
    /// Wall time spent inside the selection
    pub latency_ns: u64,
    /// Stable hash of the context field names present (values excluded)
    pub ctx_key_fingerprint: u64,
}

/// Callback invoked once per selection.
pub type DecisionHook = Arc<dyn Fn(&DecisionEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(DecisionKind::Routed.as_str(), "routed");
        assert_eq!(DecisionKind::NoMatch.to_string(), "no_match");
    }
}
