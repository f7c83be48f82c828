//! ``src/model/window_tree.rs``
//! ============================================================================
//! # `WindowTree`: per-view tree context
//!
//! Owns the handle→node store, the flat display list, and the root list, plus
//! the current search text, external predicate chain, and sort settings. One
//! tree context is exclusively owned by its UI view for the view's lifetime;
//! every operation runs synchronously on that thread.
//!
//! Structural invariants (hold after every completed operation):
//! - store entries and display-list entries are in bijection
//! - `c ∈ p.children ⟺ c.parent = p`, with `p` present in the store
//! - the root list is exactly the set of nodes with no parent
//! - `has_children ⟺ children` non-empty

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use ahash::RandomState;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TreeConfig;
use crate::model::filter::NodePredicate;
use crate::model::window_node::{WindowAttrs, WindowColumn, WindowId, WindowNode};

const DEFAULT_CAPACITY: usize = 512;

/// Sort direction for the display list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Non-fatal data-integrity violations observed while mutating the tree.
/// Counted and logged, never raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnomalyCounters {
    /// Same identity delivered twice within one build pass.
    pub duplicates: u64,

    /// Child delivered before its parent; placed as a root instead.
    pub orphans: u64,
}

/// The tree context: store + display list + root list + view state.
pub struct WindowTree {
    pub(crate) store: HashMap<WindowId, WindowNode, RandomState>,

    /// Flat display-ordered list of every live node.
    pub(crate) node_list: Vec<WindowId>,

    /// Nodes with no resolvable parent at snapshot time.
    pub(crate) root_list: Vec<WindowId>,

    pub(crate) search_text: CompactString,
    pub(crate) search_delimiter: char,
    pub(crate) predicates: Vec<NodePredicate>,

    pub(crate) sort_column: Option<WindowColumn>,
    pub(crate) sort_order: SortOrder,

    pub(crate) anomalies: AnomalyCounters,
}

impl WindowTree {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            node_list: Vec::with_capacity(capacity),
            root_list: Vec::new(),
            search_text: CompactString::default(),
            search_delimiter: '|',
            predicates: Vec::new(),
            sort_column: None,
            sort_order: SortOrder::Ascending,
            anomalies: AnomalyCounters::default(),
        }
    }

    /// Construct with capacity, delimiter, and default sort from config.
    #[must_use]
    pub fn from_config(config: &TreeConfig) -> Self {
        let mut tree: Self = Self::with_capacity(config.store_capacity);
        tree.search_delimiter = config.search_delimiter;
        tree.sort_column = Some(config.default_sort_column);
        tree.sort_order = config.default_sort_order;

        tree
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn anomalies(&self) -> AnomalyCounters {
        self.anomalies
    }

    /// Display-ordered node ids.
    #[must_use]
    pub fn node_ids(&self) -> &[WindowId] {
        &self.node_list
    }

    /// Ids of nodes with no resolvable parent.
    #[must_use]
    pub fn root_ids(&self) -> &[WindowId] {
        &self.root_list
    }

    /// Iterate nodes in display order.
    pub fn nodes(&self) -> impl Iterator<Item = &WindowNode> {
        self.node_list
            .iter()
            .filter_map(|id: &WindowId| self.store.get(id))
    }

    // ────────────────────────────────────────────────────────────
    // Store operations
    // ────────────────────────────────────────────────────────────

    /// Idempotent insert: an identity already present returns the existing
    /// node unchanged; otherwise a fresh node is appended to the display
    /// list and starts life as a root. [`WindowTree::link`] moves it under a
    /// parent later.
    pub fn add(&mut self, id: WindowId) -> &mut WindowNode {
        match self.store.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),

            Entry::Vacant(entry) => {
                self.node_list.push(id);
                self.root_list.push(id);
                entry.insert(WindowNode::new(id))
            }
        }
    }

    #[must_use]
    pub fn find(&self, id: WindowId) -> Option<&WindowNode> {
        self.store.get(&id)
    }

    #[must_use]
    pub fn find_mut(&mut self, id: WindowId) -> Option<&mut WindowNode> {
        self.store.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: WindowId) -> bool {
        self.store.contains_key(&id)
    }

    /// Remove one node: unlinks it from the store, the display list, and its
    /// parent's child list (flipping the parent's `has_children` when the
    /// last child goes). Descendants are not removed; they are promoted to
    /// roots so the structural invariants keep holding. Use
    /// [`WindowTree::remove_subtree`] for a cascading delete.
    ///
    /// Unknown identity is a no-op returning `None`.
    pub fn remove(&mut self, id: WindowId) -> Option<WindowNode> {
        let node: WindowNode = self.store.remove(&id)?;

        if let Some(pos) = self.node_list.iter().position(|n: &WindowId| *n == id) {
            self.node_list.remove(pos);
        }

        match node.parent {
            Some(parent_id) => {
                if let Some(parent) = self.store.get_mut(&parent_id) {
                    parent.children.retain(|c| *c != id);
                    parent.flags.has_children = !parent.children.is_empty();
                }
            }

            None => self.root_list.retain(|r: &WindowId| *r != id),
        }

        // Orphaned descendants become roots; the caller chose not to cascade.
        for child_id in node.children.iter().copied() {
            if let Some(child) = self.store.get_mut(&child_id) {
                child.parent = None;
                self.root_list.push(child_id);
            }
        }

        Some(node)
    }

    /// Remove a node and its entire subtree, leaves first.
    ///
    /// Returns the number of nodes removed; 0 for an unknown identity.
    pub fn remove_subtree(&mut self, id: WindowId) -> usize {
        if !self.store.contains_key(&id) {
            return 0;
        }

        // Pre-order collection via explicit worklist, then delete in reverse
        // so children always go before their parent.
        let mut ordered: Vec<WindowId> = Vec::new();
        let mut worklist: Vec<WindowId> = vec![id];

        while let Some(current) = worklist.pop() {
            ordered.push(current);

            if let Some(node) = self.store.get(&current) {
                worklist.extend(node.children.iter().copied());
            }
        }

        for node_id in ordered.iter().rev().copied() {
            self.remove(node_id);
        }

        ordered.len()
    }

    /// Remove all nodes, releasing owned text caches and child sequences.
    pub fn clear(&mut self) {
        self.store.clear();
        self.node_list.clear();
        self.root_list.clear();
    }

    /// Incremental single-resource variant of the build pass, for
    /// event-driven add/update without a full rebuild.
    ///
    /// A known identity gets its attributes replaced (text cache dropped) and
    /// is re-attached if its parent changed. An unknown identity becomes a
    /// new node. A parent identity that cannot be resolved in the store
    /// places the node as a root and counts an orphan anomaly.
    pub fn add_or_update(
        &mut self,
        id: WindowId,
        parent: Option<WindowId>,
        attrs: WindowAttrs,
    ) -> WindowId {
        if self.store.contains_key(&id) {
            let old_parent: Option<WindowId> =
                self.store.get(&id).and_then(|n: &WindowNode| n.parent);

            let resolved: Option<WindowId> = self.resolve_parent(id, parent);

            if old_parent != resolved {
                self.unlink(id);
                self.link(id, resolved);
            }

            if let Some(node) = self.store.get_mut(&id) {
                node.set_attrs(attrs);
                node.populate_text_cache();
            }
        } else {
            let mut node: WindowNode = WindowNode::with_attrs(id, attrs);
            node.populate_text_cache();

            self.store.insert(id, node);
            self.node_list.push(id);

            let resolved: Option<WindowId> = self.resolve_parent(id, parent);
            self.link(id, resolved);
        }

        self.recompute_visibility();

        id
    }

    /// Resolve a claimed parent identity against the store; unresolvable
    /// parents degrade to "root" with an orphan anomaly. A parent that is
    /// `id` itself or one of `id`'s descendants would close a cycle and is
    /// rejected the same way.
    fn resolve_parent(&mut self, id: WindowId, parent: Option<WindowId>) -> Option<WindowId> {
        match parent {
            Some(parent_id) if self.would_cycle(id, parent_id) => {
                self.anomalies.orphans += 1;
                debug!(
                    marker = "TREE_ANOMALY",
                    kind = "cycle",
                    id = %id,
                    parent = %parent_id,
                    "attaching here would close a parent cycle, placing as root"
                );
                None
            }

            Some(parent_id) if self.store.contains_key(&parent_id) => Some(parent_id),

            Some(parent_id) => {
                self.anomalies.orphans += 1;
                debug!(
                    marker = "TREE_ANOMALY",
                    kind = "orphan",
                    id = %id,
                    parent = %parent_id,
                    "parent not resolvable in store, placing as root"
                );
                None
            }

            None => None,
        }
    }

    /// True when making `parent_id` the parent of `id` would close a cycle:
    /// `parent_id` is `id` itself, or `id` already sits on `parent_id`'s
    /// ancestor chain. The hop cap keeps a corrupted store from looping.
    fn would_cycle(&self, id: WindowId, parent_id: WindowId) -> bool {
        if parent_id == id {
            return true;
        }

        let mut cursor: Option<WindowId> =
            self.store.get(&parent_id).and_then(|n: &WindowNode| n.parent);
        let mut hops: usize = 0;

        while let Some(ancestor) = cursor {
            if ancestor == id {
                return true;
            }

            if hops > self.store.len() {
                break;
            }

            cursor = self.store.get(&ancestor).and_then(|n: &WindowNode| n.parent);
            hops += 1;
        }

        false
    }

    /// Attach a stored node under a resolved parent (or as a root).
    /// The parent, when given, must already be present in the store.
    pub(crate) fn link(&mut self, id: WindowId, parent: Option<WindowId>) {
        // A fresh or unlinked node may still sit in the root list.
        self.root_list.retain(|r| *r != id);

        match parent {
            Some(parent_id) => {
                if let Some(parent_node) = self.store.get_mut(&parent_id) {
                    parent_node.children.push(id);
                    parent_node.flags.has_children = true;
                }

                if let Some(node) = self.store.get_mut(&id) {
                    node.parent = Some(parent_id);
                }
            }

            None => {
                self.root_list.push(id);

                if let Some(node) = self.store.get_mut(&id) {
                    node.parent = None;
                }
            }
        }
    }

    /// Detach a stored node from its current parent or the root list,
    /// leaving it unlinked but still stored.
    pub(crate) fn unlink(&mut self, id: WindowId) {
        let parent: Option<WindowId> = self.store.get(&id).and_then(|n: &WindowNode| n.parent);

        match parent {
            Some(parent_id) => {
                if let Some(parent_node) = self.store.get_mut(&parent_id) {
                    parent_node.children.retain(|c| *c != id);
                    parent_node.flags.has_children = !parent_node.children.is_empty();
                }
            }

            None => self.root_list.retain(|r: &WindowId| *r != id),
        }
    }

    // ────────────────────────────────────────────────────────────
    // Display ordering
    // ────────────────────────────────────────────────────────────

    /// Reorder the display list by one column. Stable, deterministic: equal
    /// keys tie-break on identity order. Topology and identity are untouched.
    pub fn sort_nodes(&mut self, column: WindowColumn, order: SortOrder) {
        let store = &self.store;

        self.node_list.sort_by(|a: &WindowId, b: &WindowId| {
            let key: Ordering = match (store.get(a), store.get(b)) {
                (Some(na), Some(nb)) => compare_by_column(na, nb, column),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };

            let key: Ordering = match order {
                SortOrder::Ascending => key,
                SortOrder::Descending => key.reverse(),
            };

            key.then(a.cmp(b))
        });

        self.sort_column = Some(column);
        self.sort_order = order;
    }

    #[must_use]
    pub fn sort_state(&self) -> (Option<WindowColumn>, SortOrder) {
        (self.sort_column, self.sort_order)
    }
}

/// Comparator over raw attributes, parameterized by column id.
fn compare_by_column(a: &WindowNode, b: &WindowNode, column: WindowColumn) -> Ordering {
    match column {
        WindowColumn::Class => a.attrs.class_name.cmp(&b.attrs.class_name),

        WindowColumn::Handle => a.id.cmp(&b.id),

        WindowColumn::Text => a.attrs.window_text.cmp(&b.attrs.window_text),

        WindowColumn::Thread => (a.attrs.process_id, a.attrs.thread_id)
            .cmp(&(b.attrs.process_id, b.attrs.thread_id)),

        WindowColumn::Module => a.attrs.module_path.cmp(&b.attrs.module_path),
    }
}

impl Default for WindowTree {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impl: the predicate chain is opaque closures.
impl fmt::Debug for WindowTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowTree")
            .field("nodes", &self.store.len())
            .field("roots", &self.root_list.len())
            .field("search_text", &self.search_text)
            .field("predicates", &self.predicates.len())
            .field("sort_column", &self.sort_column)
            .field("sort_order", &self.sort_order)
            .field("anomalies", &self.anomalies)
            .finish()
    }
}
