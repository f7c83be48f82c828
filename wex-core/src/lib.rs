//! ``wex-core``
//! ============================================================================
//! Hierarchical live-window snapshot tree.
//!
//! Maintains an identity-stable, incrementally-updatable index over a live,
//! externally-owned window hierarchy: reconciliation against an abstract
//! enumerator, substring/OR-term filtering, and identity-addressed selection
//! and navigation. Single-threaded by contract; every operation runs on the
//! thread that owns the [`WindowTree`].

pub mod error;
pub use error::{TreeError, TreeResult};

pub mod config;
pub use config::TreeConfig;

pub mod logging;
pub use logging::{LogConfig, init_tracing};

pub mod enumerate;
pub use enumerate::{
    IconResolver, ScriptedEnumerator, WindowEnumerator, WindowRecord, WindowScope,
};

pub mod model {
    pub mod window_node;
    pub use window_node::{NodeFlags, WindowAttrs, WindowColumn, WindowId, WindowNode};

    pub mod window_tree;
    pub use window_tree::{AnomalyCounters, SortOrder, WindowTree};

    pub mod reconciler;
    pub use reconciler::{BuildStats, CancelToken};

    pub mod filter;
    pub use filter::NodePredicate;

    pub mod selection;
    pub use selection::RevealOutcome;
}

pub use model::{
    BuildStats, CancelToken, NodePredicate, RevealOutcome, SortOrder, WindowAttrs, WindowColumn,
    WindowId, WindowNode, WindowTree,
};
