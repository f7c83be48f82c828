//! ``src/model/filter.rs``
//! ============================================================================
//! # Filter engine: per-node visibility from search text + predicate chain
//!
//! The search string splits on the configured OR-delimiter into terms; a node
//! is visible iff the string is empty or at least one non-empty term matches
//! (case-insensitive substring) in at least one populated text-cache slot.
//! External predicates AND on top. Recomputation is one linear scan over the
//! display list, cheap enough to run per keystroke on the owning thread.
//!
//! Filtering only flips the per-node `filter_visible` flag — it never
//! creates or destroys nodes and never touches parent/child edges.

use memchr::memmem::Finder;
use smallvec::SmallVec;
use tracing::debug;

use crate::model::window_node::{WindowId, WindowNode};
use crate::model::window_tree::WindowTree;

/// Externally supplied visibility predicate; must be a pure function of
/// node state.
pub type NodePredicate = Box<dyn Fn(&WindowNode) -> bool>;

impl WindowTree {
    /// Current search text.
    #[must_use]
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    /// Replace the search text and recompute visibility.
    pub fn set_search_text(&mut self, text: &str) {
        self.search_text = text.into();
        self.recompute_visibility();
    }

    /// Replace the external predicate chain and recompute visibility.
    pub fn set_filter_predicates(&mut self, predicates: Vec<NodePredicate>) {
        self.predicates = predicates;
        self.recompute_visibility();
    }

    /// Ids of nodes currently passing the filter, in display order.
    #[must_use]
    pub fn visible_ids(&self) -> Vec<WindowId> {
        self.node_list
            .iter()
            .filter(|id: &&WindowId| {
                self.store
                    .get(id)
                    .is_some_and(|n: &WindowNode| n.flags.filter_visible)
            })
            .copied()
            .collect()
    }

    /// One linear scan: visibility = text-match AND all predicates.
    pub(crate) fn recompute_visibility(&mut self) {
        // Lowercase each OR-term once; zero-length terms are ignored.
        let terms: SmallVec<[String; 4]> = self
            .search_text
            .split(self.search_delimiter)
            .filter(|term: &&str| !term.is_empty())
            .map(str::to_lowercase)
            .collect();

        let finders: SmallVec<[Finder<'_>; 4]> = terms
            .iter()
            .map(|term: &String| Finder::new(term.as_bytes()))
            .collect();

        // Decide immutably first (predicates borrow nodes), then apply.
        let mut decisions: Vec<(WindowId, bool)> = Vec::with_capacity(self.node_list.len());
        let mut shown: usize = 0;

        for id in &self.node_list {
            let Some(node) = self.store.get(id) else {
                continue;
            };

            let text_ok: bool = finders.is_empty() || text_matches(node, &finders);
            let visible: bool =
                text_ok && self.predicates.iter().all(|pred: &NodePredicate| pred(node));
            shown += usize::from(visible);
            decisions.push((*id, visible));
        }

        for (id, visible) in decisions {
            if let Some(node) = self.store.get_mut(&id) {
                node.flags.filter_visible = visible;
            }
        }

        debug!(
            marker = "TREE_FILTER",
            terms = terms.len(),
            predicates = self.predicates.len(),
            shown,
            total = self.node_list.len(),
            "visibility recomputed"
        );
    }
}

/// Case-insensitive OR-term match across all populated text-cache slots,
/// short-circuiting on the first hit.
fn text_matches(node: &WindowNode, finders: &[Finder<'_>]) -> bool {
    for slot in node.populated_text() {
        if slot.is_empty() {
            continue;
        }

        let folded: String = slot.to_lowercase();

        if finders
            .iter()
            .any(|finder: &Finder<'_>| finder.find(folded.as_bytes()).is_some())
        {
            return true;
        }
    }

    false
}
