//! Snapshot registry
//!
//! Holds the active snapshot behind an atomic pointer swap. Readers take a
//! reference with a single atomic load and keep it for the duration of one
//! selection; writers install a replacement without ever blocking readers.
//! A retired snapshot is dropped when the last in-flight selection releases
//! its reference.

use arc_swap::ArcSwapOption;
use pixgate_core::Snapshot;
use std::sync::Arc;

/// Registry holding the single active snapshot.
///
/// Exactly one snapshot is active at any time after the first install;
/// rulesets are replaced whole, never edited in place.
pub struct SnapshotRegistry {
    active: ArcSwapOption<Snapshot>,
}

impl std::fmt::Debug for SnapshotRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotRegistry")
            .field("active", &self.active_id())
            .finish()
    }
}

impl Default for SnapshotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotRegistry {
    /// Create an empty registry (no active snapshot yet).
    pub fn new() -> Self {
        Self {
            active: ArcSwapOption::empty(),
        }
    }

    /// Borrow the active snapshot for one selection.
    ///
    /// A single atomic load; never blocks, never observes a partial swap.
    /// Selections in flight keep the snapshot they loaded even if a new one
    /// is installed meanwhile.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.active.load_full()
    }

    /// Atomically replace the active snapshot, returning the prior one.
    ///
    /// Every selection started after this returns observes the new
    /// snapshot.
    pub fn install(&self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        self.install_arc(Arc::new(snapshot))
    }

    /// As [`install`](Self::install), for an already shared snapshot.
    pub fn install_arc(&self, snapshot: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        let id = snapshot.id();
        let version = snapshot.version();
        let rules = snapshot.rule_count();
        let prior = self.active.swap(Some(snapshot));
        tracing::info!(
            ruleset_id = id,
            version,
            rules,
            prior_version = prior.as_ref().map(|p| p.version()),
            "snapshot installed"
        );
        prior
    }

    /// `(id, version)` of the active snapshot, for observability.
    pub fn active_id(&self) -> Option<(i64, i64)> {
        self.active.load().as_ref().map(|s| (s.id(), s.version()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pixgate_core::doc::RulesetDoc;
    use std::collections::HashSet;

    fn snapshot(id: i64, version: i64) -> Snapshot {
        let gateways: HashSet<String> = ["CELCOIN".to_string()].into_iter().collect();
        Snapshot::new(
            id,
            version,
            None,
            None,
            Some("CELCOIN".to_string()),
            gateways,
            Vec::new(),
            Utc::now(),
            RulesetDoc::new(id, version),
        )
    }

    #[test]
    fn test_empty_registry() {
        let registry = SnapshotRegistry::new();
        assert!(registry.current().is_none());
        assert!(registry.active_id().is_none());
    }

    #[test]
    fn test_install_returns_prior() {
        let registry = SnapshotRegistry::new();
        assert!(registry.install(snapshot(1, 1)).is_none());
        assert_eq!(registry.active_id(), Some((1, 1)));

        let prior = registry.install(snapshot(1, 2)).unwrap();
        assert_eq!(prior.version(), 1);
        assert_eq!(registry.active_id(), Some((1, 2)));
    }

    #[test]
    fn test_reader_keeps_old_snapshot_across_install() {
        let registry = SnapshotRegistry::new();
        registry.install(snapshot(1, 1));

        let held = registry.current().unwrap();
        registry.install(snapshot(1, 2));

        // The in-flight reference still sees version 1; new readers see 2.
        assert_eq!(held.version(), 1);
        assert_eq!(registry.current().unwrap().version(), 2);
    }
}
