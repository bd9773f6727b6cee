//! Telemetry decorator for matchers
//!
//! Wraps an inner matcher and reports its logical path, result and elapsed
//! time through `tracing::debug!`. Only produced when a ruleset is compiled
//! with `debug = true`, so the regular hot path carries no wrapper at all.
//! Context keys may be reported; context values never are.

use crate::context::RequestCtx;
use crate::matcher::Matcher;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Debug wrapper around an inner matcher.
#[derive(Debug, Clone)]
pub struct DebugMatcher {
    inner: Box<Matcher>,
    /// Logical position in the condition tree, e.g. `rules[2].condition_json.all[1]`
    path: String,
    capture_ctx_keys: bool,
}

impl DebugMatcher {
    pub fn new(inner: Matcher, path: impl Into<String>, capture_ctx_keys: bool) -> Self {
        Self {
            inner: Box::new(inner),
            path: path.into(),
            capture_ctx_keys,
        }
    }

    /// The wrapped matcher.
    pub fn inner(&self) -> &Matcher {
        &self.inner
    }

    /// Logical tree position of the wrapped node.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn matches(&self, ctx: &RequestCtx, now: DateTime<Utc>) -> bool {
        let started = Instant::now();
        let result = self.inner.matches(ctx, now);
        let elapsed_ns = started.elapsed().as_nanos() as u64;

        if self.capture_ctx_keys {
            tracing::debug!(
                path = %self.path,
                kind = self.inner.kind(),
                result,
                elapsed_ns,
                ctx_keys = ?sorted_keys(ctx),
                "matcher evaluated"
            );
        } else {
            tracing::debug!(
                path = %self.path,
                kind = self.inner.kind(),
                result,
                elapsed_ns,
                "matcher evaluated"
            );
        }
        result
    }
}

fn sorted_keys(ctx: &RequestCtx) -> Vec<&str> {
    let mut keys: Vec<&str> = ctx.keys().collect();
    keys.sort_unstable();
    keys
}
