//! ``src/model/selection.rs``
//! ============================================================================
//! # Selection / navigation: identity-addressed display-state operations
//!
//! Selection, expand/collapse, and filter visibility are three independent
//! per-node axes. The operations here drive the first two; the filter engine
//! owns the third. All reads report in display (node-list) order.

use smallvec::SmallVec;
use tracing::debug;

use crate::model::window_node::{WindowId, WindowNode};
use crate::model::window_tree::WindowTree;

/// Result of a select-and-reveal request.
///
/// The active filter is preserved: targets it still hides are reported in
/// `still_hidden` rather than being silently ignored or clearing the
/// user's search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealOutcome {
    /// Selected, ancestors expanded, passing the filter.
    pub revealed: Vec<WindowId>,

    /// Selected and expanded, but the active filter still hides them.
    pub still_hidden: Vec<WindowId>,

    /// Identities not present in the tree (stale handles).
    pub unknown: Vec<WindowId>,
}

impl RevealOutcome {
    /// True when every requested node ended up revealed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.still_hidden.is_empty() && self.unknown.is_empty()
    }
}

impl WindowTree {
    /// The single primary-selection node: first selected node in display
    /// order, or none.
    #[must_use]
    pub fn selected(&self) -> Option<WindowId> {
        self.node_list
            .iter()
            .find(|id: &&WindowId| {
                self.store
                    .get(id)
                    .is_some_and(|n: &WindowNode| n.flags.selected)
            })
            .copied()
    }

    /// All selected nodes, in display order.
    #[must_use]
    pub fn selected_set(&self) -> Vec<WindowId> {
        self.node_list
            .iter()
            .filter(|id: &&WindowId| {
                self.store
                    .get(id)
                    .is_some_and(|n: &WindowNode| n.flags.selected)
            })
            .copied()
            .collect()
    }

    /// Set one node's selection state. Returns false for a stale identity.
    pub fn set_selected(&mut self, id: WindowId, selected: bool) -> bool {
        match self.store.get_mut(&id) {
            Some(node) => {
                node.flags.selected = selected;
                true
            }

            None => false,
        }
    }

    pub fn deselect_all(&mut self) {
        for node in self.store.values_mut() {
            node.flags.selected = false;
        }
    }

    /// Toggle expand/collapse; only meaningful for nodes with children.
    /// Returns the new state, or `None` for a stale identity.
    pub fn toggle_expanded(&mut self, id: WindowId) -> Option<bool> {
        self.store.get_mut(&id).map(|node: &mut WindowNode| {
            node.flags.expanded = !node.flags.expanded;
            node.flags.expanded
        })
    }

    /// Set the expand/collapse state for every node that has children.
    /// Selection and filter state are untouched.
    pub fn expand_all(&mut self, expand: bool) {
        for node in self.store.values_mut() {
            if node.flags.has_children {
                node.flags.expanded = expand;
            }
        }
    }

    /// Select exactly the given nodes and make each visible by expanding all
    /// of its ancestors. Previous selection is cleared first. Nodes the
    /// active filter hides stay hidden and are reported in the outcome.
    pub fn select_and_reveal(&mut self, ids: &[WindowId]) -> RevealOutcome {
        self.deselect_all();

        let mut outcome = RevealOutcome::default();

        for &id in ids {
            if !self.store.contains_key(&id) {
                outcome.unknown.push(id);
                continue;
            }

            // Walk the parent chain by identity. The structural invariants
            // rule out cycles; the hop cap keeps a corrupted store from
            // looping us forever.
            let mut chain: SmallVec<[WindowId; 8]> = SmallVec::new();
            let mut cursor: Option<WindowId> =
                self.store.get(&id).and_then(|n: &WindowNode| n.parent);

            while let Some(ancestor) = cursor {
                if chain.len() > self.store.len() {
                    break;
                }

                chain.push(ancestor);
                cursor = self.store.get(&ancestor).and_then(|n: &WindowNode| n.parent);
            }

            for ancestor in chain {
                if let Some(node) = self.store.get_mut(&ancestor) {
                    node.flags.expanded = true;
                }
            }

            if let Some(node) = self.store.get_mut(&id) {
                node.flags.selected = true;

                if node.flags.filter_visible {
                    outcome.revealed.push(id);
                } else {
                    outcome.still_hidden.push(id);
                }
            }
        }

        debug!(
            marker = "TREE_REVEAL",
            requested = ids.len(),
            revealed = outcome.revealed.len(),
            still_hidden = outcome.still_hidden.len(),
            unknown = outcome.unknown.len(),
            "select-and-reveal applied"
        );

        outcome
    }
}
