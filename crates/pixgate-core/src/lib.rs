//! PIXGATE Core - Core types for the pixgate gateway selector
//!
//! This crate provides the fundamental types used across the pixgate
//! workspace:
//! - Scalar values and the request context read by matchers
//! - Wire-format document types (ruleset, rule, action)
//! - The compiled matcher tree
//! - Compiled actions and immutable ruleset snapshots
//! - The frozen stable hash used for sticky routing

pub mod context;
pub mod doc;
pub mod hash;
pub mod matcher;
pub mod scalar;
pub mod snapshot;

// Re-export commonly used types
pub use context::RequestCtx;
pub use doc::{ActionDoc, ConditionType, RuleDoc, RulesetDoc};
pub use matcher::Matcher;
pub use scalar::Scalar;
pub use snapshot::{CompiledAction, CompiledRule, Snapshot, WeightedAction, WeightedEntry, WEIGHT_SCALE};
