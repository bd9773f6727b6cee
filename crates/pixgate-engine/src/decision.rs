//! Selection outcomes

use crate::event::DecisionKind;

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A rule matched and routed to a gateway
    Routed {
        /// Chosen gateway name
        gateway: String,
        /// The matching rule
        rule_id: i64,
    },
    /// A rule matched and denied the payout
    Denied {
        /// Operator-defined denial code
        reason_code: String,
        /// The matching rule
        rule_id: i64,
    },
    /// No rule matched; the ruleset's default gateway was used
    Defaulted {
        /// The default gateway name
        gateway: String,
    },
    /// No rule matched and no default gateway is configured
    NoMatch,
}

impl Decision {
    /// The decision's kind tag, as reported in decision events.
    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Routed { .. } => DecisionKind::Routed,
            Decision::Denied { .. } => DecisionKind::Denied,
            Decision::Defaulted { .. } => DecisionKind::Defaulted,
            Decision::NoMatch => DecisionKind::NoMatch,
        }
    }

    /// The gateway this decision routes to, if any.
    pub fn gateway(&self) -> Option<&str> {
        match self {
            Decision::Routed { gateway, .. } | Decision::Defaulted { gateway } => Some(gateway),
            _ => None,
        }
    }

    /// The rule that produced this decision, if any.
    pub fn rule_id(&self) -> Option<i64> {
        match self {
            Decision::Routed { rule_id, .. } | Decision::Denied { rule_id, .. } => Some(*rule_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let routed = Decision::Routed {
            gateway: "E2E".to_string(),
            rule_id: 2,
        };
        assert_eq!(routed.kind(), DecisionKind::Routed);
        assert_eq!(routed.gateway(), Some("E2E"));
        assert_eq!(routed.rule_id(), Some(2));

        let denied = Decision::Denied {
            reason_code: "blocked".to_string(),
            rule_id: 1,
        };
        assert_eq!(denied.kind(), DecisionKind::Denied);
        assert_eq!(denied.gateway(), None);
        assert_eq!(denied.rule_id(), Some(1));

        let defaulted = Decision::Defaulted {
            gateway: "CELCOIN".to_string(),
        };
        assert_eq!(defaulted.kind(), DecisionKind::Defaulted);
        assert_eq!(defaulted.gateway(), Some("CELCOIN"));
        assert_eq!(defaulted.rule_id(), None);

        assert_eq!(Decision::NoMatch.kind(), DecisionKind::NoMatch);
    }
}
