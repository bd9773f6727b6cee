//! End-to-end selection tests over compiled rulesets.

use chrono::{DateTime, Utc};
use pixgate_compiler::compile_ruleset_json;
use pixgate_core::{RequestCtx, Snapshot};
use pixgate_engine::{evaluate, Decision, GatewaySelector, SelectOptions};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn eval_seeded(snapshot: &Snapshot, ctx: &RequestCtx, seed: u64) -> Decision {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let now = ctx.now().unwrap_or_else(Utc::now);
    evaluate(snapshot, ctx, now, &mut rng)
}

/// Deny one user, default everything else.
#[test]
fn deny_rule_then_default_fallback() {
    let snapshot = compile_ruleset_json(
        r#"{
            "id": 1, "version": 1, "default_gateway": "CELCOIN",
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 10, "priority": 1, "enabled": true,
                  "condition_type": "USER", "condition_value": 999,
                  "action": { "route": "DENY", "reason_code": "blocked" } }
            ]
        }"#,
    )
    .unwrap();

    let denied = eval_seeded(&snapshot, &RequestCtx::new().with_api_user_id(999), 0);
    assert_eq!(
        denied,
        Decision::Denied {
            reason_code: "blocked".to_string(),
            rule_id: 10
        }
    );

    let defaulted = eval_seeded(&snapshot, &RequestCtx::new().with_api_user_id(1), 0);
    assert_eq!(
        defaulted,
        Decision::Defaulted {
            gateway: "CELCOIN".to_string()
        }
    );
}

/// Priority order: the deny at priority 1 shadows the fixed route at 2 for
/// the blocked user; other users fall through to the PIX key rule.
#[test]
fn fixed_routing_by_pix_key_respects_priority() {
    let snapshot = compile_ruleset_json(
        r#"{
            "id": 1, "version": 1, "default_gateway": "CELCOIN",
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 1, "priority": 1, "enabled": true,
                  "condition_type": "USER", "condition_value": 999,
                  "action": { "route": "DENY", "reason_code": "blocked" } },
                { "id": 2, "priority": 2, "enabled": true,
                  "condition_type": "PIX_KEY", "condition_value": "x@y.io",
                  "action": { "route": "FIXED", "gateway": "E2E" } }
            ]
        }"#,
    )
    .unwrap();

    let ctx = RequestCtx::new().with_api_user_id(1).with_pix_key("x@y.io");
    assert_eq!(
        eval_seeded(&snapshot, &ctx, 0),
        Decision::Routed {
            gateway: "E2E".to_string(),
            rule_id: 2
        }
    );

    let blocked = RequestCtx::new().with_api_user_id(999).with_pix_key("x@y.io");
    assert_eq!(eval_seeded(&snapshot, &blocked, 0).rule_id(), Some(1));
}

fn weighted_sticky_snapshot() -> Snapshot {
    compile_ruleset_json(
        r#"{
            "id": 1, "version": 1, "default_gateway": "CELCOIN",
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 3, "priority": 3, "enabled": true,
                  "condition_type": "ADVANCED",
                  "condition_json": { "all": [
                      { "type": "VALUE_IN", "field": "pix_key_type", "values": ["EVP"], "coerce": "str" },
                      { "type": "AMOUNT_RANGE", "field": "amount", "coerce": "int", "scale": 2,
                        "min": "0.00", "max": "1000.00",
                        "min_inclusive": true, "max_inclusive": true }
                  ] },
                  "action": { "route": "WEIGHTED",
                              "weights": { "CELCOIN": 70, "E2E": 30 },
                              "sticky_by": "api_user_id" } }
            ]
        }"#,
    )
    .unwrap()
}

/// Weighted routing with stickiness: stable per user, amount gate intact.
#[test]
fn weighted_with_stickiness() {
    let snapshot = weighted_sticky_snapshot();

    // 50000 minor units = 500.00, inside the range.
    let ctx = RequestCtx::new()
        .with_api_user_id(42)
        .with_pix_key_type("EVP")
        .with_amount(50000i64);
    let first = eval_seeded(&snapshot, &ctx, 0);
    assert_eq!(first.rule_id(), Some(3));
    for seed in 1..50 {
        assert_eq!(eval_seeded(&snapshot, &ctx, seed), first);
    }

    // 100001 = 1000.01 is past the ceiling: the rule does not match.
    let over = RequestCtx::new()
        .with_api_user_id(42)
        .with_pix_key_type("EVP")
        .with_amount(100001i64);
    assert_eq!(
        eval_seeded(&snapshot, &over, 0),
        Decision::Defaulted {
            gateway: "CELCOIN".to_string()
        }
    );
}

/// Stickiness survives recompilation of the same document.
#[test]
fn sticky_bucket_stable_across_recompiles() {
    let a = weighted_sticky_snapshot();
    let b = compile_ruleset_json(&serde_json::to_string(&a.export()).unwrap()).unwrap();

    for user in [1i64, 7, 42, 999, 123_456] {
        let ctx = RequestCtx::new()
            .with_api_user_id(user)
            .with_pix_key_type("EVP")
            .with_amount(1000i64);
        assert_eq!(
            eval_seeded(&a, &ctx, 0).gateway(),
            eval_seeded(&b, &ctx, 1).gateway(),
            "user {user} moved between snapshots"
        );
    }
}

/// Determinism: fixed snapshot + ctx + now + seed always yields the same
/// decision, even for non-sticky weighted draws.
#[test]
fn selection_is_deterministic_under_fixed_seed() {
    let snapshot = compile_ruleset_json(
        r#"{
            "id": 1, "version": 1,
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 1, "priority": 1, "enabled": true,
                  "condition_type": "ADVANCED",
                  "condition_json": { "all": [] },
                  "action": { "route": "WEIGHTED", "weights": { "CELCOIN": 50, "E2E": 50 } } }
            ]
        }"#,
    )
    .unwrap();

    let ctx = RequestCtx::new();
    for seed in 0..20 {
        let first = eval_seeded(&snapshot, &ctx, seed);
        for _ in 0..5 {
            assert_eq!(eval_seeded(&snapshot, &ctx, seed), first);
        }
    }
}

/// Weight distribution: non-sticky draws converge on the declared ratio.
#[test]
fn weighted_distribution_converges() {
    let snapshot = compile_ruleset_json(
        r#"{
            "id": 1, "version": 1,
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 1, "priority": 1, "enabled": true,
                  "condition_type": "ADVANCED",
                  "condition_json": { "all": [] },
                  "action": { "route": "WEIGHTED", "weights": { "CELCOIN": 70, "E2E": 30 } } }
            ]
        }"#,
    )
    .unwrap();

    let ctx = RequestCtx::new();
    let now = Utc::now();
    let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);
    let total = 20_000u32;
    let mut celcoin = 0u32;
    for _ in 0..total {
        match evaluate(&snapshot, &ctx, now, &mut rng) {
            Decision::Routed { gateway, .. } if gateway == "CELCOIN" => celcoin += 1,
            Decision::Routed { .. } => {}
            other => panic!("unexpected decision {other:?}"),
        }
    }
    let fraction = celcoin as f64 / total as f64;
    // 3-sigma band around 0.70 for 20k draws is roughly +-0.01.
    assert!(
        (fraction - 0.70).abs() < 0.015,
        "observed CELCOIN fraction {fraction}"
    );
}

/// Midnight-crossing time window driven through ctx.now.
#[test]
fn midnight_window_scenario() {
    let snapshot = compile_ruleset_json(
        r#"{
            "id": 1, "version": 1, "default_gateway": "CELCOIN",
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 1, "priority": 1, "enabled": true,
                  "condition_type": "ADVANCED",
                  "condition_json": { "type": "TIME_WINDOW",
                                      "tz": "America/Sao_Paulo",
                                      "start": "22:00", "end": "06:00" },
                  "action": { "route": "FIXED", "gateway": "E2E" } }
            ]
        }"#,
    )
    .unwrap();

    let at = |rfc3339: &str| {
        let now = DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc);
        let ctx = RequestCtx::new().with_now(now);
        eval_seeded(&snapshot, &ctx, 0)
    };

    assert_eq!(at("2024-01-01T23:30:00-03:00").gateway(), Some("E2E"));
    assert_eq!(at("2024-01-01T05:00:00-03:00").gateway(), Some("E2E"));
    assert_eq!(at("2024-01-01T12:00:00-03:00").gateway(), Some("CELCOIN"));
}

/// NONE composes as pure negation of its children.
#[test]
fn none_composite_end_to_end() {
    let snapshot = compile_ruleset_json(
        r#"{
            "id": 1, "version": 1, "default_gateway": "CELCOIN",
            "gateways": ["CELCOIN", "E2E"],
            "rules": [
                { "id": 1, "priority": 1, "enabled": true,
                  "condition_type": "ADVANCED",
                  "condition_json": { "none": [
                      { "type": "VALUE_IN", "field": "pix_key_type", "values": ["CPF", "CNPJ"], "coerce": "str" }
                  ] },
                  "action": { "route": "FIXED", "gateway": "E2E" } }
            ]
        }"#,
    )
    .unwrap();

    // Non-document keys route through E2E…
    let evp = RequestCtx::new().with_pix_key_type("EVP");
    assert_eq!(eval_seeded(&snapshot, &evp, 0).gateway(), Some("E2E"));
    // …and so does a context with no pix_key_type at all (absent is false).
    assert_eq!(eval_seeded(&snapshot, &RequestCtx::new(), 0).gateway(), Some("E2E"));

    let cpf = RequestCtx::new().with_pix_key_type("CPF");
    assert_eq!(eval_seeded(&snapshot, &cpf, 0).gateway(), Some("CELCOIN"));
}

/// The chosen rule is always the minimum-priority rule that matches,
/// independent of document order.
#[test]
fn minimum_priority_match_wins_regardless_of_document_order() {
    let snapshot = compile_ruleset_json(
        r#"{
            "id": 1, "version": 1,
            "gateways": ["CELCOIN", "E2E", "STARKBANK"],
            "rules": [
                { "id": 30, "priority": 30, "enabled": true,
                  "condition_type": "USER", "condition_value": 1,
                  "action": { "route": "FIXED", "gateway": "STARKBANK" } },
                { "id": 10, "priority": 10, "enabled": true,
                  "condition_type": "USER", "condition_value": 1,
                  "action": { "route": "FIXED", "gateway": "CELCOIN" } },
                { "id": 20, "priority": 20, "enabled": true,
                  "condition_type": "USER", "condition_value": 1,
                  "action": { "route": "FIXED", "gateway": "E2E" } }
            ]
        }"#,
    )
    .unwrap();

    let ctx = RequestCtx::new().with_api_user_id(1);
    assert_eq!(
        eval_seeded(&snapshot, &ctx, 0),
        Decision::Routed {
            gateway: "CELCOIN".to_string(),
            rule_id: 10
        }
    );
}

/// The selector facade resolves now from options, then ctx, then the clock.
#[test]
fn selector_now_resolution_order() {
    let selector = GatewaySelector::new();
    selector.registry().install(
        compile_ruleset_json(
            r#"{
                "id": 1, "version": 1, "default_gateway": "CELCOIN",
                "gateways": ["CELCOIN", "E2E"],
                "rules": [
                    { "id": 1, "priority": 1, "enabled": true,
                      "condition_type": "ADVANCED",
                      "condition_json": { "type": "TIME_WINDOW", "tz": "UTC",
                                          "start": "10:00", "end": "11:00" },
                      "action": { "route": "FIXED", "gateway": "E2E" } }
                ]
            }"#,
        )
        .unwrap(),
    );

    let inside = DateTime::parse_from_rfc3339("2024-03-01T10:30:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let outside = DateTime::parse_from_rfc3339("2024-03-01T20:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    // ctx.now drives the window…
    let d = selector
        .select(&RequestCtx::new().with_now(inside))
        .unwrap();
    assert_eq!(d.gateway(), Some("E2E"));

    // …but an explicit option wins over ctx.now.
    let d = selector
        .select_with(
            &RequestCtx::new().with_now(inside),
            SelectOptions::default().with_now(outside),
        )
        .unwrap();
    assert_eq!(d.gateway(), Some("CELCOIN"));
}
