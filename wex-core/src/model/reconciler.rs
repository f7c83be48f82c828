//! ``src/model/reconciler.rs``
//! ============================================================================
//! # Reconciler: full rebuild of the window tree from a live enumeration
//!
//! Builds a fresh generation (store + display list + root list) from the
//! enumerator's records, resolving parent links against the generation being
//! built, then atomically swaps it in. Resources that disappeared are dropped
//! with the old generation; display-axis flags (expanded/selected) carry
//! forward for identities that survive, so a refresh does not collapse the
//! view.
//!
//! Failure semantics:
//! - wholesale enumeration failure → error, installed generation untouched
//! - cancellation between records → in-progress generation discarded,
//!   installed generation untouched
//! - duplicate identity / out-of-order child → counted anomaly, pass continues

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ahash::RandomState;
use smallvec::SmallVec;
use tracing::{info, warn};

use crate::enumerate::{IconResolver, WindowEnumerator, WindowRecord, WindowScope};
use crate::error::{TreeError, TreeResult};
use crate::model::window_node::{WindowId, WindowNode};
use crate::model::window_tree::WindowTree;

/// Caller-driven cancellation signal, checked between enumerated records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Outcome of one completed build pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Records delivered by the enumerator.
    pub enumerated: usize,

    /// Nodes installed in the new generation.
    pub installed: usize,

    /// Duplicate identities skipped in favor of the first occurrence.
    pub duplicates: usize,

    /// Children delivered before their parent, placed as roots.
    pub orphans: usize,

    pub elapsed: Duration,
}

impl WindowTree {
    /// Rebuild the tree to match the live hierarchy for `scope`.
    ///
    /// On success the new generation replaces the old one in a single swap
    /// (no reader on the owning thread can observe a mix) and filter
    /// visibility is recomputed for the surviving search text and predicate
    /// chain. On any error the currently installed generation is left fully
    /// intact.
    pub fn build(
        &mut self,
        scope: WindowScope,
        enumerator: &mut dyn WindowEnumerator,
        icons: Option<&dyn IconResolver>,
        cancel: &CancelToken,
    ) -> TreeResult<BuildStats> {
        let start: Instant = Instant::now();

        // The enumerator checks the token between resources, so a slow live
        // walk is interruptible; the loop below re-checks between attaches.
        let records: Vec<WindowRecord> = enumerator.enumerate(scope, cancel)?;

        let mut stats = BuildStats {
            enumerated: records.len(),
            ..BuildStats::default()
        };

        // The generation under construction. Parents are resolved against
        // *these* collections, never the installed ones.
        let mut store: HashMap<WindowId, WindowNode, RandomState> =
            HashMap::with_capacity_and_hasher(records.len(), RandomState::new());
        let mut node_list: Vec<WindowId> = Vec::with_capacity(records.len());
        let mut root_list: Vec<WindowId> = Vec::new();

        for record in records {
            if cancel.is_cancelled() {
                info!(
                    marker = "TREE_BUILD_CANCELLED",
                    scope = %scope,
                    partial = node_list.len(),
                    "build abandoned at cancellation checkpoint"
                );
                return Err(TreeError::BuildCancelled);
            }

            // Defensive: a correct enumerator never repeats an identity
            // within a pass. Keep the first occurrence.
            if store.contains_key(&record.id) {
                stats.duplicates += 1;
                self.anomalies.duplicates += 1;
                warn!(
                    marker = "TREE_ANOMALY",
                    kind = "duplicate",
                    id = %record.id,
                    "duplicate identity within one pass, skipping"
                );
                continue;
            }

            let mut node: WindowNode = WindowNode::with_attrs(record.id, record.attrs);

            if let Some(resolver) = icons {
                node.icon_index = resolver.resolve(node.attrs.module_path.as_str());
            }

            node.populate_text_cache();

            // Carry display-axis state forward for a surviving identity.
            if let Some(previous) = self.store.get(&record.id) {
                node.flags.expanded = previous.flags.expanded;
                node.flags.selected = previous.flags.selected;
            }

            let parent: Option<WindowId> = match record.parent {
                Some(parent_id) if store.contains_key(&parent_id) => Some(parent_id),

                Some(parent_id) => {
                    // Contract violation of parent-before-child ordering:
                    // the child becomes a root, flagged anomalous.
                    stats.orphans += 1;
                    self.anomalies.orphans += 1;
                    warn!(
                        marker = "TREE_ANOMALY",
                        kind = "orphan",
                        id = %record.id,
                        parent = %parent_id,
                        "child enumerated before its parent, placing as root"
                    );
                    None
                }

                None => None,
            };

            node.parent = parent;
            node_list.push(record.id);

            match parent {
                Some(parent_id) => {
                    if let Some(parent_node) = store.get_mut(&parent_id) {
                        parent_node.children.push(record.id);
                    }
                }

                None => root_list.push(record.id),
            }

            store.insert(record.id, node);
        }

        // `has_children` is derived from final occupancy, after the whole
        // pass — never from what the enumerator claimed mid-stream.
        let parents: SmallVec<[WindowId; 16]> = store
            .iter()
            .filter(|(_, node)| !node.children.is_empty())
            .map(|(id, _)| *id)
            .collect();

        for id in parents {
            if let Some(node) = store.get_mut(&id) {
                node.flags.has_children = true;
            }
        }

        stats.installed = store.len();
        stats.elapsed = start.elapsed();

        // Atomic relative to the single-threaded event loop: replace all
        // three collections before any reader runs again.
        self.store = store;
        self.node_list = node_list;
        self.root_list = root_list;

        // Re-apply the view's display order and filter to the new generation.
        if let (Some(column), order) = self.sort_state() {
            self.sort_nodes(column, order);
        }
        self.recompute_visibility();

        info!(
            marker = "TREE_BUILD",
            scope = %scope,
            enumerated = stats.enumerated,
            installed = stats.installed,
            duplicates = stats.duplicates,
            orphans = stats.orphans,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "window tree rebuilt"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::ScriptedEnumerator;
    use crate::model::window_node::{WindowAttrs, WindowColumn};
    use compact_str::CompactString;

    fn record(id: usize, parent: Option<usize>, class: &str) -> WindowRecord {
        WindowRecord::with_attrs(
            WindowId(id),
            parent.map(WindowId),
            WindowAttrs {
                class_name: CompactString::new(class),
                window_visible: true,
                ..WindowAttrs::default()
            },
        )
    }

    fn abcd() -> Vec<WindowRecord> {
        vec![
            record(0xA, None, "root"),
            record(0xB, Some(0xA), "left"),
            record(0xC, Some(0xA), "right"),
            record(0xD, Some(0xB), "leaf"),
        ]
    }

    struct FixedIcons;

    impl IconResolver for FixedIcons {
        fn resolve(&self, module_path: &str) -> Option<usize> {
            (!module_path.is_empty()).then_some(7)
        }
    }

    #[test]
    fn builds_expected_topology() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());

        let stats = tree
            .build(WindowScope::Desktop, &mut windows, None, &CancelToken::new())
            .unwrap();

        assert_eq!(stats.installed, 4);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(stats.orphans, 0);

        assert_eq!(tree.root_ids(), &[WindowId(0xA)]);

        let a = tree.find(WindowId(0xA)).unwrap();
        assert_eq!(a.children.as_slice(), &[WindowId(0xB), WindowId(0xC)]);
        assert!(a.flags.has_children);

        let b = tree.find(WindowId(0xB)).unwrap();
        assert_eq!(b.children.as_slice(), &[WindowId(0xD)]);
        assert!(b.flags.has_children);

        assert!(!tree.find(WindowId(0xC)).unwrap().flags.has_children);
        assert!(!tree.find(WindowId(0xD)).unwrap().flags.has_children);
    }

    #[test]
    fn rebuild_is_topology_idempotent() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());
        let cancel = CancelToken::new();

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        let ids_before: Vec<WindowId> = tree.node_ids().to_vec();
        let roots_before: Vec<WindowId> = tree.root_ids().to_vec();

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        assert_eq!(tree.node_ids(), ids_before.as_slice());
        assert_eq!(tree.root_ids(), roots_before.as_slice());
        assert_eq!(
            tree.find(WindowId(0xB)).unwrap().children.as_slice(),
            &[WindowId(0xD)]
        );
    }

    #[test]
    fn duplicate_identity_is_skipped_and_counted() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(vec![
            record(0xA, None, "first"),
            record(0xA, None, "second"),
        ]);

        let stats = tree
            .build(WindowScope::Desktop, &mut windows, None, &CancelToken::new())
            .unwrap();

        assert_eq!(stats.duplicates, 1);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.find(WindowId(0xA)).unwrap().attrs.class_name, "first");
        assert_eq!(tree.anomalies().duplicates, 1);
    }

    #[test]
    fn out_of_order_child_becomes_root() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(vec![
            record(0xB, Some(0xA), "early-child"),
            record(0xA, None, "late-parent"),
        ]);

        let stats = tree
            .build(WindowScope::Desktop, &mut windows, None, &CancelToken::new())
            .unwrap();

        assert_eq!(stats.orphans, 1);
        assert_eq!(
            tree.root_ids(),
            &[WindowId(0xB), WindowId(0xA)],
            "the orphaned child is placed as a root, not dropped or reparented"
        );
        assert_eq!(tree.find(WindowId(0xB)).unwrap().parent, None);
        assert!(!tree.find(WindowId(0xA)).unwrap().flags.has_children);
    }

    #[test]
    fn enumeration_failure_keeps_last_known_good() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());
        let cancel = CancelToken::new();

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        let mut broken = ScriptedEnumerator::failing("hierarchy unavailable");
        let err = tree
            .build(WindowScope::Desktop, &mut broken, None, &cancel)
            .unwrap_err();

        assert!(matches!(err, TreeError::EnumerationFailed { .. }));
        assert_eq!(tree.len(), 4, "installed generation must survive a failed pass");
        assert_eq!(tree.root_ids(), &[WindowId(0xA)]);
    }

    #[test]
    fn cancellation_discards_in_progress_generation() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());
        let cancel = CancelToken::new();

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        let pre_cancelled = CancelToken::new();
        pre_cancelled.cancel();

        let mut next = ScriptedEnumerator::new(vec![record(0xE, None, "new-root")]);
        let err = tree
            .build(WindowScope::Desktop, &mut next, None, &pre_cancelled)
            .unwrap_err();

        assert!(matches!(err, TreeError::BuildCancelled));
        assert_eq!(tree.len(), 4, "cancelled build must not touch installed state");
        assert!(tree.find(WindowId(0xE)).is_none());
    }

    /// Walks a fixed record list but trips the shared token partway through,
    /// the way a caller-side timeout fires while a live walk is still running.
    struct InterruptedWalk {
        records: Vec<WindowRecord>,
        cancel_after: usize,
        shared: CancelToken,
    }

    impl WindowEnumerator for InterruptedWalk {
        fn enumerate(
            &mut self,
            _scope: WindowScope,
            cancel: &CancelToken,
        ) -> TreeResult<Vec<WindowRecord>> {
            let mut out: Vec<WindowRecord> = Vec::new();

            for record in &self.records {
                if cancel.is_cancelled() {
                    return Err(TreeError::BuildCancelled);
                }

                if out.len() == self.cancel_after {
                    self.shared.cancel();
                }

                out.push(record.clone());
            }

            Ok(out)
        }
    }

    #[test]
    fn cancellation_fires_during_enumeration() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());
        let cancel = CancelToken::new();

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        let shared = CancelToken::new();
        let mut interrupted = InterruptedWalk {
            records: vec![record(0xE, None, "new-root"), record(0xF, Some(0xE), "child")],
            cancel_after: 1,
            shared: shared.clone(),
        };

        let err = tree
            .build(WindowScope::Desktop, &mut interrupted, None, &shared)
            .unwrap_err();

        assert!(matches!(err, TreeError::BuildCancelled));
        assert_eq!(
            tree.len(),
            4,
            "a pass interrupted mid-enumeration must not touch installed state"
        );
        assert!(tree.find(WindowId(0xE)).is_none());
    }

    #[test]
    fn display_flags_carry_across_rebuilds() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());
        let cancel = CancelToken::new();

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        tree.find_mut(WindowId(0xB)).unwrap().flags.expanded = true;
        tree.find_mut(WindowId(0xD)).unwrap().flags.selected = true;

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        assert!(tree.find(WindowId(0xB)).unwrap().flags.expanded);
        assert!(tree.find(WindowId(0xD)).unwrap().flags.selected);
    }

    #[test]
    fn vanished_windows_are_dropped() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());
        let cancel = CancelToken::new();

        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        windows.set_records(vec![record(0xA, None, "root")]);
        tree.build(WindowScope::Desktop, &mut windows, None, &cancel)
            .unwrap();

        assert_eq!(tree.len(), 1);
        assert!(tree.find(WindowId(0xB)).is_none());
        assert!(!tree.find(WindowId(0xA)).unwrap().flags.has_children);
    }

    #[test]
    fn icons_resolve_through_the_service() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(vec![
            WindowRecord::with_attrs(
                WindowId(1),
                None,
                WindowAttrs {
                    module_path: CompactString::const_new("C:\\Windows\\explorer.exe"),
                    ..WindowAttrs::default()
                },
            ),
            record(2, None, "no-module"),
        ]);

        tree.build(
            WindowScope::Desktop,
            &mut windows,
            Some(&FixedIcons),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(tree.find(WindowId(1)).unwrap().icon_index, Some(7));
        assert_eq!(tree.find(WindowId(2)).unwrap().icon_index, None);
    }

    #[test]
    fn build_repopulates_text_cache() {
        let mut tree = WindowTree::new();
        let mut windows = ScriptedEnumerator::new(abcd());

        tree.build(WindowScope::Desktop, &mut windows, None, &CancelToken::new())
            .unwrap();

        let a = tree.find(WindowId(0xA)).unwrap();
        assert_eq!(a.cached_text(WindowColumn::Class), Some("root"));
        assert_eq!(a.cached_text(WindowColumn::Handle), Some("0xa"));
    }
}
