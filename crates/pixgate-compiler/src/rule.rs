//! Single-rule compilation
//!
//! Expands the alias condition types (USER / PIX_KEY / PIX_KEY_TYPE) into
//! membership matchers, compiles ADVANCED condition trees, and normalizes
//! the rule's action against the ruleset's known gateways.

use crate::condition::{compile_condition, DebugConfig};
use crate::error::{CompileErrorKind, CompileIssue};
use crate::weights::normalize_weights;
use pixgate_core::doc::{ActionDoc, ConditionType, RuleDoc};
use pixgate_core::matcher::{DebugMatcher, Matcher, MemberSet, ValueInMatcher};
use pixgate_core::{context, CompiledAction, CompiledRule, Scalar, WeightedAction};
use std::collections::HashSet;

/// Closed set of PIX key type tags the PIX_KEY_TYPE alias accepts.
pub const PIX_KEY_TYPES: [&str; 7] = [
    "QRCODE_STATIC",
    "QRCODE_DYNAMIC",
    "EMAIL",
    "PHONE",
    "CPF",
    "CNPJ",
    "EVP",
];

/// Compile one declared rule. `index` is the rule's position in the
/// document, used for issue paths.
pub(crate) fn compile_rule(
    index: usize,
    rule: &RuleDoc,
    known_gateways: &HashSet<String>,
    debug: DebugConfig,
    issues: &mut Vec<CompileIssue>,
) -> Option<CompiledRule> {
    let path = format!("rules[{index}]");

    let matcher = compile_rule_condition(rule, &path, debug, issues);
    let action = compile_action(&rule.action, known_gateways, &path, issues);

    let (matcher, action) = (matcher?, action?);
    Some(CompiledRule {
        id: rule.id,
        priority: rule.priority,
        name: rule.name.clone(),
        matcher,
        action,
    })
}

fn compile_rule_condition(
    rule: &RuleDoc,
    path: &str,
    debug: DebugConfig,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    match rule.condition_type {
        ConditionType::Advanced => {
            let Some(tree) = &rule.condition_json else {
                issues.push(CompileIssue::new(
                    path,
                    CompileErrorKind::MissingField,
                    "ADVANCED rules require 'condition_json'",
                ));
                return None;
            };
            compile_condition(tree, &format!("{path}.condition_json"), debug, issues)
        }
        alias => {
            let Some(value) = &rule.condition_value else {
                issues.push(CompileIssue::new(
                    path,
                    CompileErrorKind::MissingField,
                    format!("{} rules require 'condition_value'", alias_name(alias)),
                ));
                return None;
            };
            let matcher = expand_alias(alias, value, path, issues)?;
            Some(if debug.debug {
                Matcher::Debug(DebugMatcher::new(matcher, path, debug.capture_ctx_keys))
            } else {
                matcher
            })
        }
    }
}

fn alias_name(alias: ConditionType) -> &'static str {
    match alias {
        ConditionType::User => "USER",
        ConditionType::PixKey => "PIX_KEY",
        ConditionType::PixKeyType => "PIX_KEY_TYPE",
        ConditionType::Advanced => "ADVANCED",
    }
}

/// Expand an alias condition into its membership matcher.
fn expand_alias(
    alias: ConditionType,
    value: &serde_json::Value,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<Matcher> {
    let value_path = format!("{path}.condition_value");
    let Some(scalar) = Scalar::from_json(value) else {
        issues.push(CompileIssue::new(
            value_path,
            CompileErrorKind::BadType,
            "'condition_value' must be a number or string",
        ));
        return None;
    };

    match alias {
        ConditionType::User => {
            let Some(uid) = scalar.as_int() else {
                issues.push(CompileIssue::new(
                    value_path,
                    CompileErrorKind::BadType,
                    format!("USER requires an integer user id, got {scalar}"),
                ));
                return None;
            };
            Some(Matcher::ValueIn(ValueInMatcher::new(
                context::fields::API_USER_ID,
                MemberSet::Ints([uid].into_iter().collect()),
            )))
        }
        ConditionType::PixKey => Some(Matcher::ValueIn(ValueInMatcher::new(
            context::fields::PIX_KEY,
            MemberSet::Strs([scalar.display_string()].into_iter().collect()),
        ))),
        ConditionType::PixKeyType => {
            let tag = scalar.display_string().to_uppercase();
            if !PIX_KEY_TYPES.contains(&tag.as_str()) {
                issues.push(CompileIssue::new(
                    value_path,
                    CompileErrorKind::InvalidPixKeyType,
                    format!("unknown PIX key type: {scalar}"),
                ));
                return None;
            }
            Some(Matcher::ValueIn(ValueInMatcher::new(
                context::fields::PIX_KEY_TYPE,
                MemberSet::Strs([tag].into_iter().collect()),
            )))
        }
        ConditionType::Advanced => unreachable!("ADVANCED is expanded by the caller"),
    }
}

/// Validate and normalize an action against the known gateways.
fn compile_action(
    action: &ActionDoc,
    known_gateways: &HashSet<String>,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<CompiledAction> {
    match action {
        ActionDoc::Fixed { gateway } => {
            if !known_gateways.contains(gateway) {
                issues.push(CompileIssue::new(
                    format!("{path}.action.gateway"),
                    CompileErrorKind::UnknownGateway,
                    format!("unknown gateway: {gateway:?}"),
                ));
                return None;
            }
            Some(CompiledAction::Fixed {
                gateway: gateway.clone(),
            })
        }
        ActionDoc::Weighted { weights, sticky_by } => {
            let (entries, total) = normalize_weights(
                weights,
                known_gateways,
                &format!("{path}.action.weights"),
                issues,
            )?;
            Some(CompiledAction::Weighted(WeightedAction::new(
                entries,
                total,
                sticky_by.clone(),
            )))
        }
        ActionDoc::Deny { reason_code } => {
            if reason_code.is_empty() {
                issues.push(CompileIssue::new(
                    format!("{path}.action.reason_code"),
                    CompileErrorKind::BadType,
                    "'reason_code' must be a non-empty string",
                ));
                return None;
            }
            Some(CompiledAction::Deny {
                reason_code: reason_code.clone(),
            })
        }
    }
}
