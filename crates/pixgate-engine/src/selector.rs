//! Gateway selection
//!
//! The hot path: walk the snapshot's rules in ascending priority, stop at
//! the first matcher that returns true, resolve its action. Weighted
//! actions resolve through the cumulative distribution — a sticky hash
//! bucket when the configured context field is present, a uniform draw from
//! the injected RNG otherwise. Selection is CPU-only and total over
//! well-formed context; nothing on this path performs I/O or takes a lock.

use crate::decision::Decision;
use crate::error::{Result, SelectError};
use crate::event::{DecisionEvent, DecisionHook};
use crate::registry::SnapshotRegistry;
use chrono::{DateTime, Utc};
use pixgate_core::hash::sticky_bucket;
use pixgate_core::{CompiledAction, RequestCtx, Snapshot, WeightedAction};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Instant;

/// Evaluate one selection against a snapshot.
///
/// `now` is the single instant every time-window matcher observes. `rng`
/// backs the uniform draw for weighted actions without a usable sticky key;
/// injecting it keeps selections reproducible under test.
pub fn evaluate<R: Rng + ?Sized>(
    snapshot: &Snapshot,
    ctx: &RequestCtx,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Decision {
    for rule in snapshot.rules() {
        if !rule.matcher.matches(ctx, now) {
            continue;
        }
        return match &rule.action {
            CompiledAction::Fixed { gateway } => Decision::Routed {
                gateway: gateway.clone(),
                rule_id: rule.id,
            },
            CompiledAction::Weighted(action) => Decision::Routed {
                gateway: resolve_weighted(action, snapshot.sticky_salt(), ctx, rng).to_string(),
                rule_id: rule.id,
            },
            CompiledAction::Deny { reason_code } => Decision::Denied {
                reason_code: reason_code.clone(),
                rule_id: rule.id,
            },
        };
    }

    match snapshot.default_gateway() {
        Some(gateway) => Decision::Defaulted {
            gateway: gateway.to_string(),
        },
        None => Decision::NoMatch,
    }
}

/// Resolve a weighted action to a gateway name.
///
/// With a sticky field present, the bucket is the frozen hash of the
/// value's canonical string form — identical requests land on the same
/// gateway regardless of the RNG. Otherwise the bucket is a uniform draw.
fn resolve_weighted<'a, R: Rng + ?Sized>(
    action: &'a WeightedAction,
    sticky_salt: Option<&str>,
    ctx: &RequestCtx,
    rng: &mut R,
) -> &'a str {
    let sticky_key = action
        .sticky_by()
        .and_then(|field| ctx.lookup(field))
        .map(|value| value.display_string());

    let bucket = match sticky_key {
        Some(key) => sticky_bucket(sticky_salt, &key, action.total() as u64),
        // Sticky field absent (or stickiness not configured): uniform draw
        None => rng.gen_range(0..action.total() as u64),
    };
    action.gateway_for_bucket(bucket)
}

/// Per-call selection options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    /// Evaluation instant; defaults to `ctx.now`, then wall-clock UTC
    pub now: Option<DateTime<Utc>>,
    /// Seed for the weighted-draw RNG; defaults to OS entropy
    pub rng_seed: Option<u64>,
}

impl SelectOptions {
    /// Fix the evaluation instant.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Fix the RNG seed.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

/// Facade tying together the registry, selection and decision events.
///
/// Clone-cheap handle: clones share the registry and hook.
#[derive(Clone)]
pub struct GatewaySelector {
    registry: Arc<SnapshotRegistry>,
    on_decision: Option<DecisionHook>,
}

impl GatewaySelector {
    /// Create a selector with its own empty registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SnapshotRegistry::new()))
    }

    /// Create a selector over an existing registry.
    pub fn with_registry(registry: Arc<SnapshotRegistry>) -> Self {
        Self {
            registry,
            on_decision: None,
        }
    }

    /// Register the decision-event hook, invoked once per selection.
    pub fn on_decision(mut self, hook: DecisionHook) -> Self {
        self.on_decision = Some(hook);
        self
    }

    /// The underlying registry, for installs and observability.
    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    /// Select a gateway for `ctx` with default options.
    pub fn select(&self, ctx: &RequestCtx) -> Result<Decision> {
        self.select_with(ctx, SelectOptions::default())
    }

    /// Select a gateway for `ctx`.
    ///
    /// Fails only when no snapshot has been installed yet; ruleset content
    /// can never make a selection error.
    pub fn select_with(&self, ctx: &RequestCtx, options: SelectOptions) -> Result<Decision> {
        let started = Instant::now();
        let snapshot = self
            .registry
            .current()
            .ok_or(SelectError::NoActiveSnapshot)?;

        // Resolve "now" once so the whole selection observes one instant.
        let now = options
            .now
            .or_else(|| ctx.now())
            .unwrap_or_else(Utc::now);
        let mut rng = match options.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let decision = evaluate(&snapshot, ctx, now, &mut rng);

        if let Some(hook) = &self.on_decision {
            let event = DecisionEvent {
                ruleset_id: snapshot.id(),
                version: snapshot.version(),
                rule_id: decision.rule_id(),
                kind: decision.kind(),
                latency_ns: started.elapsed().as_nanos() as u64,
                ctx_key_fingerprint: ctx.key_fingerprint(),
            };
            hook(&event);
        }

        Ok(decision)
    }
}

impl Default for GatewaySelector {
    fn default() -> Self {
        Self::new()
    }
}
