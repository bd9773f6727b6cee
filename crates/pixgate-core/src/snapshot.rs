//! Compiled, immutable ruleset snapshots
//!
//! A snapshot is the evaluation-ready form of a ruleset: rules sorted by
//! ascending priority, conditions compiled to matcher trees, actions
//! normalized and pre-validated. Once built a snapshot is never mutated;
//! rulesets are replaced whole by installing a new snapshot.

use crate::doc::RulesetDoc;
use crate::matcher::Matcher;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Normalized weight total every WEIGHTED action is scaled to.
pub const WEIGHT_SCALE: u32 = 10_000;

/// One entry of a weighted action's cumulative distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedEntry {
    /// Target gateway name
    pub gateway: String,
    /// Running total of normalized weights up to and including this entry
    pub cumulative: u32,
}

/// Pre-normalized weighted routing action.
///
/// Entries are sorted by gateway name so sticky buckets are stable across
/// compiles; the cumulative array makes bucket lookup a binary search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedAction {
    entries: Vec<WeightedEntry>,
    total: u32,
    sticky_by: Option<String>,
}

impl WeightedAction {
    /// Build from a cumulative entry array.
    ///
    /// The compiler guarantees entries are sorted by gateway name, the
    /// cumulative values are non-decreasing and the last equals `total`.
    pub fn new(entries: Vec<WeightedEntry>, total: u32, sticky_by: Option<String>) -> Self {
        debug_assert!(!entries.is_empty());
        debug_assert_eq!(entries.last().map(|e| e.cumulative), Some(total));
        Self {
            entries,
            total,
            sticky_by,
        }
    }

    /// The cumulative distribution entries.
    pub fn entries(&self) -> &[WeightedEntry] {
        &self.entries
    }

    /// Sum of normalized weights (always [`WEIGHT_SCALE`] for compiled
    /// actions).
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Context field that pins repeated requests to one gateway.
    pub fn sticky_by(&self) -> Option<&str> {
        self.sticky_by.as_deref()
    }

    /// Resolve a bucket in `[0, total)` to its gateway.
    ///
    /// Picks the first entry whose cumulative weight exceeds the bucket, so
    /// overlapping draws resolve deterministically.
    pub fn gateway_for_bucket(&self, bucket: u64) -> &str {
        debug_assert!(bucket < self.total as u64);
        let idx = self
            .entries
            .partition_point(|e| (e.cumulative as u64) <= bucket);
        // bucket < total == last cumulative, so idx is always in range
        let idx = idx.min(self.entries.len() - 1);
        &self.entries[idx].gateway
    }
}

/// Normalized, pre-validated decision payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledAction {
    /// Route to one gateway
    Fixed {
        /// Target gateway name
        gateway: String,
    },
    /// Route proportionally, optionally pinned by a context field
    Weighted(WeightedAction),
    /// Refuse to route
    Deny {
        /// Operator-defined denial code
        reason_code: String,
    },
}

/// A rule ready for the hot path.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Stable rule identifier
    pub id: i64,
    /// Evaluation order, ascending
    pub priority: i64,
    /// Optional human-readable name, carried for log lines
    pub name: Option<String>,
    /// Compiled condition
    pub matcher: Matcher,
    /// Normalized action
    pub action: CompiledAction,
}

/// Immutable compiled form of a ruleset.
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: i64,
    version: i64,
    name: Option<String>,
    sticky_salt: Option<String>,
    default_gateway: Option<String>,
    known_gateways: HashSet<String>,
    rules: Vec<CompiledRule>,
    compiled_at: DateTime<Utc>,
    source: RulesetDoc,
}

impl Snapshot {
    /// Assemble a snapshot from compiled parts.
    ///
    /// The compiler guarantees `rules` is sorted by ascending priority with
    /// unique priorities and ids, and that every gateway referenced by an
    /// action or the default is in `known_gateways`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        version: i64,
        name: Option<String>,
        sticky_salt: Option<String>,
        default_gateway: Option<String>,
        known_gateways: HashSet<String>,
        rules: Vec<CompiledRule>,
        compiled_at: DateTime<Utc>,
        source: RulesetDoc,
    ) -> Self {
        debug_assert!(rules.windows(2).all(|w| w[0].priority < w[1].priority));
        Self {
            id,
            version,
            name,
            sticky_salt,
            default_gateway,
            known_gateways,
            rules,
            compiled_at,
            source,
        }
    }

    /// Ruleset identifier.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Ruleset version.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Optional ruleset name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Salt mixed into sticky hashing, if configured.
    pub fn sticky_salt(&self) -> Option<&str> {
        self.sticky_salt.as_deref()
    }

    /// Fallback gateway used when no rule matches.
    pub fn default_gateway(&self) -> Option<&str> {
        self.default_gateway.as_deref()
    }

    /// Closed world of gateway names this snapshot was validated against.
    pub fn known_gateways(&self) -> &HashSet<String> {
        &self.known_gateways
    }

    /// Compiled rules, sorted by ascending priority.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Number of live (enabled, compiled) rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// When this snapshot was compiled.
    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    /// Export the validated source document this snapshot was compiled
    /// from. Recompiling the export yields a snapshot with identical
    /// decision behavior.
    pub fn export(&self) -> RulesetDoc {
        self.source.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, u32)]) -> Vec<WeightedEntry> {
        pairs
            .iter()
            .map(|(g, c)| WeightedEntry {
                gateway: g.to_string(),
                cumulative: *c,
            })
            .collect()
    }

    #[test]
    fn test_bucket_lookup() {
        // CELCOIN 70% / E2E 30%, sorted by name: CELCOIN [0,7000), E2E [7000,10000)
        let action = WeightedAction::new(
            entries(&[("CELCOIN", 7000), ("E2E", 10_000)]),
            WEIGHT_SCALE,
            None,
        );
        assert_eq!(action.gateway_for_bucket(0), "CELCOIN");
        assert_eq!(action.gateway_for_bucket(6999), "CELCOIN");
        assert_eq!(action.gateway_for_bucket(7000), "E2E");
        assert_eq!(action.gateway_for_bucket(9999), "E2E");
    }

    #[test]
    fn test_bucket_lookup_skips_zero_width_entries() {
        // A zero-width entry never owns a bucket
        let action = WeightedAction::new(
            entries(&[("A", 5000), ("B", 5000), ("C", 10_000)]),
            WEIGHT_SCALE,
            None,
        );
        assert_eq!(action.gateway_for_bucket(4999), "A");
        assert_eq!(action.gateway_for_bucket(5000), "C");
    }

    #[test]
    fn test_single_entry_owns_all_buckets() {
        let action = WeightedAction::new(entries(&[("ONLY", 10_000)]), WEIGHT_SCALE, None);
        assert_eq!(action.gateway_for_bucket(0), "ONLY");
        assert_eq!(action.gateway_for_bucket(9999), "ONLY");
    }
}
