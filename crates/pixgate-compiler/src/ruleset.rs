//! Whole-ruleset compilation
//!
//! Orders of operations: validate the top level, drop disabled rules,
//! compile each surviving rule (collecting every issue), check id and
//! priority uniqueness, sort by ascending priority and emit an immutable
//! snapshot. Any issue anywhere aborts the compile.

use crate::condition::DebugConfig;
use crate::error::{CompileError, CompileErrorKind, CompileIssue, Result};
use crate::rule::compile_rule;
use chrono::Utc;
use pixgate_core::doc::RulesetDoc;
use pixgate_core::{CompiledRule, Snapshot};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Compiler options.
#[derive(Debug, Clone, Copy)]
pub struct CompilerOptions {
    /// Wrap every compiled matcher node in a telemetry decorator
    pub debug: bool,
    /// With `debug`, include context key names (never values) in the traces
    pub capture_ctx_keys: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            debug: false,
            capture_ctx_keys: false,
        }
    }
}

/// The ruleset compiler.
pub struct RulesetCompiler {
    options: CompilerOptions,
}

impl RulesetCompiler {
    /// Create a compiler with default options.
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    /// Create a compiler with custom options.
    pub fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    /// The active options.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile a parsed ruleset document into an immutable snapshot.
    pub fn compile(&self, doc: &RulesetDoc) -> Result<Snapshot> {
        let started = Instant::now();
        let mut issues = Vec::new();

        let known_gateways: HashSet<String> = doc.gateways.iter().cloned().collect();
        if known_gateways.is_empty() {
            issues.push(CompileIssue::new(
                "gateways",
                CompileErrorKind::EmptyValues,
                "at least one gateway is required",
            ));
        }
        if let Some(default) = &doc.default_gateway {
            if !known_gateways.contains(default) {
                issues.push(CompileIssue::new(
                    "default_gateway",
                    CompileErrorKind::UnknownGateway,
                    format!("unknown gateway: {default:?}"),
                ));
            }
        }

        let debug = DebugConfig {
            debug: self.options.debug,
            capture_ctx_keys: self.options.capture_ctx_keys,
        };

        let mut compiled: Vec<CompiledRule> = Vec::new();
        let mut all_compiled = true;
        let mut first_id_at: HashMap<i64, usize> = HashMap::new();
        let mut first_priority_at: HashMap<i64, usize> = HashMap::new();

        for (index, rule) in doc.rules.iter().enumerate() {
            if !rule.enabled {
                continue;
            }

            if let Some(first) = first_id_at.insert(rule.id, index) {
                issues.push(CompileIssue::new(
                    format!("rules[{index}].id"),
                    CompileErrorKind::DuplicateRuleId,
                    format!("rule id {} already used by rules[{first}]", rule.id),
                ));
                first_id_at.insert(rule.id, first);
            }
            if let Some(first) = first_priority_at.insert(rule.priority, index) {
                issues.push(CompileIssue::new(
                    format!("rules[{index}].priority"),
                    CompileErrorKind::DuplicatePriority,
                    format!(
                        "priority {} already used by rules[{first}]",
                        rule.priority
                    ),
                ));
                first_priority_at.insert(rule.priority, first);
            }

            match compile_rule(index, rule, &known_gateways, debug, &mut issues) {
                Some(rule) => compiled.push(rule),
                None => all_compiled = false,
            }
        }

        if !issues.is_empty() || !all_compiled {
            return Err(CompileError::new(issues));
        }

        compiled.sort_by_key(|r| r.priority);

        let snapshot = Snapshot::new(
            doc.id,
            doc.version,
            doc.name.clone(),
            doc.sticky_salt.clone(),
            doc.default_gateway.clone(),
            known_gateways,
            compiled,
            Utc::now(),
            doc.clone(),
        );

        tracing::info!(
            ruleset_id = snapshot.id(),
            version = snapshot.version(),
            rules = snapshot.rule_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "ruleset compiled"
        );

        Ok(snapshot)
    }

    /// Compile from a raw JSON value.
    pub fn compile_value(&self, value: &serde_json::Value) -> Result<Snapshot> {
        let doc: RulesetDoc = serde_json::from_value(value.clone()).map_err(parse_error)?;
        self.compile(&doc)
    }

    /// Compile from JSON text.
    pub fn compile_json(&self, json: &str) -> Result<Snapshot> {
        let doc: RulesetDoc = serde_json::from_str(json).map_err(parse_error)?;
        self.compile(&doc)
    }
}

impl Default for RulesetCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_error(err: serde_json::Error) -> CompileError {
    CompileError::new(vec![CompileIssue::new(
        "$",
        CompileErrorKind::BadJson,
        err.to_string(),
    )])
}

/// Compile a ruleset document with default options.
pub fn compile_ruleset(doc: &RulesetDoc) -> Result<Snapshot> {
    RulesetCompiler::new().compile(doc)
}

/// Compile JSON text with default options.
pub fn compile_ruleset_json(json: &str) -> Result<Snapshot> {
    RulesetCompiler::new().compile_json(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixgate_core::doc::{ActionDoc, ConditionType, RuleDoc};
    use serde_json::json;

    fn base_doc() -> RulesetDoc {
        RulesetDoc::new(1, 1)
            .with_default_gateway("CELCOIN")
            .with_gateways(vec!["CELCOIN".to_string(), "E2E".to_string()])
    }

    #[test]
    fn test_compile_minimal_ruleset() {
        let doc = base_doc().add_rule(
            RuleDoc::new(10, 1, ConditionType::User, ActionDoc::deny("blocked"))
                .with_condition_value(json!(999)),
        );
        let snapshot = compile_ruleset(&doc).unwrap();
        assert_eq!(snapshot.id(), 1);
        assert_eq!(snapshot.rule_count(), 1);
        assert_eq!(snapshot.default_gateway(), Some("CELCOIN"));
    }

    #[test]
    fn test_empty_gateways_rejected() {
        let doc = RulesetDoc::new(1, 1);
        let err = compile_ruleset(&doc).unwrap_err();
        assert!(err.has_kind(CompileErrorKind::EmptyValues));
    }

    #[test]
    fn test_unknown_default_gateway_rejected() {
        let doc = RulesetDoc::new(1, 1)
            .with_default_gateway("GHOST")
            .with_gateways(vec!["CELCOIN".to_string()]);
        let err = compile_ruleset(&doc).unwrap_err();
        assert!(err.has_kind(CompileErrorKind::UnknownGateway));
        assert_eq!(err.issues()[0].path, "default_gateway");
    }

    #[test]
    fn test_disabled_rules_are_dropped() {
        let doc = base_doc()
            .add_rule(
                RuleDoc::new(10, 1, ConditionType::User, ActionDoc::deny("blocked"))
                    .with_condition_value(json!(999))
                    .with_enabled(false),
            )
            .add_rule(
                RuleDoc::new(11, 2, ConditionType::PixKey, ActionDoc::fixed("E2E"))
                    .with_condition_value(json!("x@y.io")),
            );
        let snapshot = compile_ruleset(&doc).unwrap();
        assert_eq!(snapshot.rule_count(), 1);
        assert_eq!(snapshot.rules()[0].id, 11);
    }

    #[test]
    fn test_disabled_rules_escape_validation() {
        // A broken rule that is disabled must not fail the compile.
        let doc = base_doc()
            .add_rule(
                RuleDoc::new(10, 1, ConditionType::User, ActionDoc::fixed("GHOST"))
                    .with_enabled(false),
            )
            .add_rule(
                RuleDoc::new(11, 2, ConditionType::PixKey, ActionDoc::fixed("E2E"))
                    .with_condition_value(json!("x@y.io")),
            );
        assert!(compile_ruleset(&doc).is_ok());
    }

    #[test]
    fn test_duplicate_priority_rejected() {
        let doc = base_doc()
            .add_rule(
                RuleDoc::new(10, 1, ConditionType::User, ActionDoc::deny("blocked"))
                    .with_condition_value(json!(999)),
            )
            .add_rule(
                RuleDoc::new(11, 1, ConditionType::PixKey, ActionDoc::fixed("E2E"))
                    .with_condition_value(json!("x@y.io")),
            );
        let err = compile_ruleset(&doc).unwrap_err();
        assert!(err.has_kind(CompileErrorKind::DuplicatePriority));
        assert_eq!(err.issues()[0].path, "rules[1].priority");
    }

    #[test]
    fn test_duplicate_priority_on_disabled_rule_is_fine() {
        let doc = base_doc()
            .add_rule(
                RuleDoc::new(10, 1, ConditionType::User, ActionDoc::deny("blocked"))
                    .with_condition_value(json!(999))
                    .with_enabled(false),
            )
            .add_rule(
                RuleDoc::new(11, 1, ConditionType::PixKey, ActionDoc::fixed("E2E"))
                    .with_condition_value(json!("x@y.io")),
            );
        assert!(compile_ruleset(&doc).is_ok());
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let doc = base_doc()
            .add_rule(
                RuleDoc::new(10, 1, ConditionType::User, ActionDoc::deny("blocked"))
                    .with_condition_value(json!(999)),
            )
            .add_rule(
                RuleDoc::new(10, 2, ConditionType::PixKey, ActionDoc::fixed("E2E"))
                    .with_condition_value(json!("x@y.io")),
            );
        let err = compile_ruleset(&doc).unwrap_err();
        assert!(err.has_kind(CompileErrorKind::DuplicateRuleId));
    }

    #[test]
    fn test_rules_sorted_by_priority() {
        let doc = base_doc()
            .add_rule(
                RuleDoc::new(10, 5, ConditionType::User, ActionDoc::deny("blocked"))
                    .with_condition_value(json!(999)),
            )
            .add_rule(
                RuleDoc::new(11, 2, ConditionType::PixKey, ActionDoc::fixed("E2E"))
                    .with_condition_value(json!("x@y.io")),
            );
        let snapshot = compile_ruleset(&doc).unwrap();
        let priorities: Vec<i64> = snapshot.rules().iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![2, 5]);
    }

    #[test]
    fn test_issues_accumulate_across_rules() {
        let doc = base_doc()
            .add_rule(RuleDoc::new(10, 1, ConditionType::User, ActionDoc::fixed("GHOST")))
            .add_rule(
                RuleDoc::new(11, 2, ConditionType::PixKeyType, ActionDoc::fixed("E2E"))
                    .with_condition_value(json!("BAD_TYPE")),
            );
        let err = compile_ruleset(&doc).unwrap_err();
        assert!(err.has_kind(CompileErrorKind::MissingField));
        assert!(err.has_kind(CompileErrorKind::UnknownGateway));
        assert!(err.has_kind(CompileErrorKind::InvalidPixKeyType));
    }

    #[test]
    fn test_compile_json_wire_format() {
        let json = r#"{
            "id": 1, "version": 1, "default_gateway": "CELCOIN",
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 1, "priority": 1, "enabled": true,
                  "condition_type": "USER", "condition_value": 999,
                  "action": { "route": "DENY", "reason_code": "blocked" } }
            ]
        }"#;
        let snapshot = compile_ruleset_json(json).unwrap();
        assert_eq!(snapshot.rule_count(), 1);
    }

    #[test]
    fn test_compile_json_malformed() {
        let err = compile_ruleset_json("{ not json").unwrap_err();
        assert!(err.has_kind(CompileErrorKind::BadJson));
    }

    #[test]
    fn test_export_round_trip_compiles_identically() {
        let doc = base_doc()
            .with_sticky_salt("salt-1")
            .add_rule(
                RuleDoc::new(1, 1, ConditionType::Advanced, ActionDoc::weighted_sticky(
                    vec![("CELCOIN", 70), ("E2E", 30)],
                    "api_user_id",
                ))
                .with_condition_json(json!({
                    "all": [
                        { "type": "VALUE_IN", "field": "pix_key_type", "values": ["EVP"], "coerce": "str" }
                    ]
                })),
            );
        let snapshot = compile_ruleset(&doc).unwrap();
        let exported = snapshot.export();
        assert_eq!(exported, doc);

        let recompiled = compile_ruleset(&exported).unwrap();
        assert_eq!(recompiled.rule_count(), snapshot.rule_count());
        assert_eq!(recompiled.sticky_salt(), snapshot.sticky_salt());
    }
}
