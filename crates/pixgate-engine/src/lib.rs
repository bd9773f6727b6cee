//! PIXGATE Engine - hot-path evaluation for compiled rulesets
//!
//! This crate serves selections: given the active snapshot and a request
//! context it walks the rules in priority order, resolves the first matching
//! rule's action (fixed, weighted with optional stickiness, or deny) and
//! returns a [`Decision`]. The snapshot registry swaps rulesets atomically
//! under concurrent read load; readers never block and never see a partial
//! state.

pub mod decision;
pub mod error;
pub mod event;
pub mod registry;
pub mod selector;

// Re-export main types
pub use decision::Decision;
pub use error::{Result, SelectError};
pub use event::{DecisionEvent, DecisionHook, DecisionKind};
pub use registry::SnapshotRegistry;
pub use selector::{evaluate, GatewaySelector, SelectOptions};
