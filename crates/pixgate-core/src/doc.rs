//! Wire-format ruleset documents
//!
//! These are the declared (input) forms the compiler accepts: a ruleset with
//! its gateways and rules, each rule carrying a condition (alias or nested
//! matcher tree) and an action. Compiled snapshots retain the validated
//! document so a ruleset can be exported back out unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A full ruleset document, replaceable as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetDoc {
    /// Stable ruleset identifier
    pub id: i64,

    /// Monotonic version of this ruleset
    pub version: i64,

    /// Optional human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Gateway used when no rule matches; must be a known gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<String>,

    /// Optional salt mixed into sticky hashing; omit to keep sticky buckets
    /// stable across rulesets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky_salt: Option<String>,

    /// Closed world of gateway names actions may reference
    pub gateways: Vec<String>,

    /// Rules in declared order; evaluation order is by ascending priority
    pub rules: Vec<RuleDoc>,
}

/// One rule in its declared form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDoc {
    /// Stable rule identifier, unique within the ruleset
    pub id: i64,

    /// Evaluation order, ascending; unique within the ruleset
    pub priority: i64,

    /// Disabled rules are dropped at compile time
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Optional human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Which condition form this rule uses
    pub condition_type: ConditionType,

    /// Scalar operand for the alias condition types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_value: Option<serde_json::Value>,

    /// Nested matcher tree for `ADVANCED` rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_json: Option<serde_json::Value>,

    /// Routing action taken when the condition matches
    pub action: ActionDoc,
}

fn default_enabled() -> bool {
    true
}

/// Condition forms a rule may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// Match a single API user id (`condition_value`)
    #[serde(rename = "USER")]
    User,
    /// Match a single PIX key (`condition_value`)
    #[serde(rename = "PIX_KEY")]
    PixKey,
    /// Match a single PIX key type tag (`condition_value`)
    #[serde(rename = "PIX_KEY_TYPE")]
    PixKeyType,
    /// Full matcher tree in `condition_json`
    #[serde(rename = "ADVANCED")]
    Advanced,
}

/// Declared action payload, tagged by `route`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "route")]
pub enum ActionDoc {
    /// Route to one gateway
    #[serde(rename = "FIXED")]
    Fixed {
        /// Target gateway name
        gateway: String,
    },

    /// Route proportionally across gateways
    #[serde(rename = "WEIGHTED")]
    Weighted {
        /// Gateway name to relative weight; weights need not sum to any
        /// particular total
        weights: BTreeMap<String, i64>,
        /// Context field whose value pins repeated requests to one gateway
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sticky_by: Option<String>,
    },

    /// Refuse to route
    #[serde(rename = "DENY")]
    Deny {
        /// Operator-defined denial code, surfaced in the decision
        reason_code: String,
    },
}

impl RulesetDoc {
    /// Create an empty ruleset document.
    pub fn new(id: i64, version: i64) -> Self {
        Self {
            id,
            version,
            name: None,
            default_gateway: None,
            sticky_salt: None,
            gateways: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the fallback gateway.
    pub fn with_default_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.default_gateway = Some(gateway.into());
        self
    }

    /// Set the sticky salt.
    pub fn with_sticky_salt(mut self, salt: impl Into<String>) -> Self {
        self.sticky_salt = Some(salt.into());
        self
    }

    /// Declare the known gateways.
    pub fn with_gateways(mut self, gateways: Vec<String>) -> Self {
        self.gateways = gateways;
        self
    }

    /// Append a rule.
    pub fn add_rule(mut self, rule: RuleDoc) -> Self {
        self.rules.push(rule);
        self
    }
}

impl RuleDoc {
    /// Create an enabled rule with the given condition type and action.
    pub fn new(id: i64, priority: i64, condition_type: ConditionType, action: ActionDoc) -> Self {
        Self {
            id,
            priority,
            enabled: true,
            name: None,
            condition_type,
            condition_value: None,
            condition_json: None,
            action,
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the alias condition operand.
    pub fn with_condition_value(mut self, value: serde_json::Value) -> Self {
        self.condition_value = Some(value);
        self
    }

    /// Set the advanced condition tree.
    pub fn with_condition_json(mut self, tree: serde_json::Value) -> Self {
        self.condition_json = Some(tree);
        self
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl ActionDoc {
    /// Fixed routing to one gateway.
    pub fn fixed(gateway: impl Into<String>) -> Self {
        ActionDoc::Fixed {
            gateway: gateway.into(),
        }
    }

    /// Weighted routing across `(gateway, weight)` pairs.
    pub fn weighted<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        ActionDoc::Weighted {
            weights: weights.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            sticky_by: None,
        }
    }

    /// Weighted routing pinned by a context field.
    pub fn weighted_sticky<I, S>(weights: I, sticky_by: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        ActionDoc::Weighted {
            weights: weights.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            sticky_by: Some(sticky_by.into()),
        }
    }

    /// Deny with a reason code.
    pub fn deny(reason_code: impl Into<String>) -> Self {
        ActionDoc::Deny {
            reason_code: reason_code.into(),
        }
    }
}
