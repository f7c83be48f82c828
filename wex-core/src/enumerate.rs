//! ``src/enumerate.rs``
//! ============================================================================
//! External interfaces consumed by the tree: the live-window enumerator and
//! the icon lookup service.
//!
//! The enumerator is the only path by which OS state enters the crate; the
//! actual OS call sequence lives behind [`WindowEnumerator`] in the embedding
//! application.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::model::reconciler::CancelToken;
use crate::model::window_node::{WindowAttrs, WindowId};

/// What slice of the live hierarchy a build pass should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowScope {
    /// Every top-level window on the desktop plus descendants.
    Desktop,

    /// Windows owned by one thread.
    Thread(u32),

    /// The child subtree of one window.
    ChildrenOf(WindowId),
}

impl std::fmt::Display for WindowScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Thread(tid) => write!(f, "thread:{tid}"),
            Self::ChildrenOf(id) => write!(f, "children-of:{id}"),
        }
    }
}

/// One enumerated window: identity, claimed parent, raw attributes.
///
/// Attribute lookups may fail independently on the producing side; degraded
/// fields arrive as empty strings / zero ids and the record is still yielded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub id: WindowId,
    pub parent: Option<WindowId>,
    pub attrs: WindowAttrs,
}

impl WindowRecord {
    #[must_use]
    pub fn new(id: WindowId, parent: Option<WindowId>) -> Self {
        Self {
            id,
            parent,
            attrs: WindowAttrs::default(),
        }
    }

    #[must_use]
    pub fn with_attrs(id: WindowId, parent: Option<WindowId>, attrs: WindowAttrs) -> Self {
        Self { id, parent, attrs }
    }
}

/// Produces an ordered enumeration of live windows for a scope.
///
/// Contract: a window is yielded only after any live ancestor that will also
/// appear in the pass (parent-before-child). The reconciler resolves parent
/// links against the generation being built, so out-of-order delivery turns
/// the child into a root and counts an anomaly rather than failing the pass.
///
/// Walking a large live hierarchy is the slow part of a build, so the
/// caller's cancellation signal is handed in here: implementations check it
/// between resources and bail out with [`TreeError::BuildCancelled`], which
/// leaves the currently installed tree generation untouched.
///
/// A wholesale failure (the scope cannot be enumerated at all) is the other
/// error path, with the same last-known-good guarantee.
pub trait WindowEnumerator {
    fn enumerate(
        &mut self,
        scope: WindowScope,
        cancel: &CancelToken,
    ) -> TreeResult<Vec<WindowRecord>>;
}

/// Resolves a module path to an image-list slot for the node icon.
/// Failure means "no icon": the node keeps `icon_index = None`.
pub trait IconResolver {
    fn resolve(&self, module_path: &str) -> Option<usize>;
}

/// Replays a fixed record list: the enumerator used by tests and by the
/// harness that renders canned hierarchies.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEnumerator {
    records: Vec<WindowRecord>,
    failure: Option<CompactString>,
}

impl ScriptedEnumerator {
    #[must_use]
    pub fn new(records: Vec<WindowRecord>) -> Self {
        Self {
            records,
            failure: None,
        }
    }

    /// An enumerator whose every pass fails wholesale with `reason`.
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(CompactString::new(reason)),
        }
    }

    /// Replace the scripted records for the next pass.
    pub fn set_records(&mut self, records: Vec<WindowRecord>) {
        self.records = records;
    }
}

impl WindowEnumerator for ScriptedEnumerator {
    fn enumerate(
        &mut self,
        scope: WindowScope,
        cancel: &CancelToken,
    ) -> TreeResult<Vec<WindowRecord>> {
        match &self.failure {
            Some(reason) => Err(TreeError::enumeration_failed(
                &scope.to_string(),
                reason.as_str(),
            )),

            None => {
                let mut records: Vec<WindowRecord> = Vec::with_capacity(self.records.len());

                for record in &self.records {
                    if cancel.is_cancelled() {
                        return Err(TreeError::BuildCancelled);
                    }

                    records.push(record.clone());
                }

                Ok(records)
            }
        }
    }
}
