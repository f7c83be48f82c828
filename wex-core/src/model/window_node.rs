//! ``src/model/window_node.rs``
//! ============================================================================
//! Node data model for the window snapshot tree.
//!
//! One [`WindowNode`] represents one live window at a point in time. Identity
//! is the raw handle value; parent links are reference-by-identity (a lookup
//! key, never a borrowed pointer), children are an owned ordered id sequence
//! in discovery order. Per-column display text is computed once per node and
//! cached; only an explicit refresh invalidates it.

use std::fmt;

use compact_str::{CompactString, ToCompactString, format_compact};
use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Stable handle value uniquely naming one live window.
///
/// The sole key for lookup, diffing, and equality; opaque to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub usize);

// Handles render as lowercase hex, matching how the raw value is shown
// in the Handle column.
impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Recognized display columns, one text-cache slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowColumn {
    Class,
    Handle,
    Text,
    Thread,
    Module,
}

impl fmt::Display for WindowColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &str = match self {
            Self::Class => "class",
            Self::Handle => "handle",
            Self::Text => "text",
            Self::Thread => "thread",
            Self::Module => "module",
        };

        write!(f, "{s}")
    }
}

/// Raw attributes delivered by the enumerator for one window.
///
/// Individual lookups may fail independently on the enumerator side and
/// degrade to empty strings / zero ids — partial information beats a missing
/// node, so a node is still created from a degraded record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAttrs {
    /// Window class name (empty if the lookup failed).
    pub class_name: CompactString,

    /// Title text (empty if the lookup failed).
    pub window_text: CompactString,

    /// Owning thread id, 0 if unresolved.
    pub thread_id: u32,

    /// Owning process id, 0 if unresolved.
    pub process_id: u32,

    /// Full path of the owning module (empty if unresolved).
    pub module_path: CompactString,

    /// Resource-level visibility (the window's own visible style), independent
    /// of filter visibility.
    pub window_visible: bool,
}

/// Per-node display state.
///
/// `expanded`, `selected`, and `filter_visible` are three independent axes; a
/// node can be simultaneously selected, hidden by filter, and expanded. The
/// display layer decides what that combination renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFlags {
    /// True iff `children` is non-empty; recomputed after every build pass.
    pub has_children: bool,

    /// Resource-level visibility, copied from the raw attributes.
    pub window_visible: bool,

    /// Expand/collapse state; only meaningful when `has_children`.
    pub expanded: bool,

    /// Selection state, driven solely by the selection operations.
    pub selected: bool,

    /// Filter visibility, driven solely by the filter engine.
    pub filter_visible: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            has_children: false,
            window_visible: false,
            expanded: false,
            selected: false,
            // No filter applied yet means everything shows.
            filter_visible: true,
        }
    }
}

/// One live window within the tree at a point in time.
#[derive(Debug, Clone)]
pub struct WindowNode {
    /// Stable identity; unique within the store.
    pub id: WindowId,

    /// Identity of the live parent, none for roots.
    pub parent: Option<WindowId>,

    /// Owned child ids; insertion order = discovery order of the current build.
    pub children: SmallVec<[WindowId; 4]>,

    pub flags: NodeFlags,

    /// Raw attributes the text cache is derived from.
    pub attrs: WindowAttrs,

    /// Icon slot resolved from the owning module, `None` = no icon.
    pub icon_index: Option<usize>,

    /// Cached display strings, one slot per column; filled once per node,
    /// invalidated only by [`WindowNode::refresh_text`].
    text_cache: EnumMap<WindowColumn, Option<CompactString>>,
}

impl WindowNode {
    #[must_use]
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            parent: None,
            children: SmallVec::new(),
            flags: NodeFlags::default(),
            attrs: WindowAttrs::default(),
            icon_index: None,
            text_cache: EnumMap::default(),
        }
    }

    #[must_use]
    pub fn with_attrs(id: WindowId, attrs: WindowAttrs) -> Self {
        let mut node: Self = Self::new(id);
        node.flags.window_visible = attrs.window_visible;
        node.attrs = attrs;

        node
    }

    /// Replace the raw attributes and drop the derived text cache.
    pub fn set_attrs(&mut self, attrs: WindowAttrs) {
        self.flags.window_visible = attrs.window_visible;
        self.attrs = attrs;
        self.refresh_text();
    }

    /// Display text for one column, computed on first access and cached.
    pub fn column_text(&mut self, column: WindowColumn) -> &str {
        if self.text_cache[column].is_none() {
            self.text_cache[column] = Some(self.render_column(column));
        }

        self.text_cache[column]
            .as_deref()
            .unwrap_or_default()
    }

    /// Cached text for one column without computing it; `None` if the slot
    /// has not been populated yet.
    #[must_use]
    pub fn cached_text(&self, column: WindowColumn) -> Option<&str> {
        self.text_cache[column].as_deref()
    }

    /// Iterate over all populated cache slots.
    pub fn populated_text(&self) -> impl Iterator<Item = &str> {
        self.text_cache
            .values()
            .filter_map(|slot: &Option<CompactString>| slot.as_deref())
    }

    /// Fill every cache slot. The reconciler calls this once per node at
    /// attach time so the filter engine can scan populated slots immutably.
    pub fn populate_text_cache(&mut self) {
        for column in [
            WindowColumn::Class,
            WindowColumn::Handle,
            WindowColumn::Text,
            WindowColumn::Thread,
            WindowColumn::Module,
        ] {
            let _ = self.column_text(column);
        }
    }

    /// Drop all cached text; slots refill lazily on next access.
    pub fn refresh_text(&mut self) {
        self.text_cache = EnumMap::default();
    }

    fn render_column(&self, column: WindowColumn) -> CompactString {
        match column {
            WindowColumn::Class => self.attrs.class_name.clone(),

            WindowColumn::Handle => self.id.to_compact_string(),

            WindowColumn::Text => self.attrs.window_text.clone(),

            // "pid: tid" description of the owning thread; a degraded record
            // (both zero) renders as empty rather than "0: 0".
            WindowColumn::Thread => {
                if self.attrs.process_id == 0 && self.attrs.thread_id == 0 {
                    CompactString::default()
                } else {
                    format_compact!("{}: {}", self.attrs.process_id, self.attrs.thread_id)
                }
            }

            // File name of the owning module, not the full path. Module
            // paths arrive in the enumerator's native notation, so split on
            // both separator styles regardless of the host platform.
            WindowColumn::Module => self
                .attrs
                .module_path
                .rsplit(['\\', '/'])
                .next()
                .filter(|name: &&str| !name.is_empty())
                .map(CompactString::new)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attrs() -> WindowAttrs {
        WindowAttrs {
            class_name: CompactString::const_new("Shell_TrayWnd"),
            window_text: CompactString::const_new("Taskbar"),
            thread_id: 4242,
            process_id: 1000,
            module_path: CompactString::const_new("C:\\Windows\\explorer.exe"),
            window_visible: true,
        }
    }

    #[test]
    fn handle_renders_as_hex() {
        let mut node = WindowNode::new(WindowId(0x1a2b0));
        assert_eq!(node.column_text(WindowColumn::Handle), "0x1a2b0");
    }

    #[test]
    fn thread_and_module_columns() {
        let mut node = WindowNode::with_attrs(WindowId(1), sample_attrs());
        assert_eq!(node.column_text(WindowColumn::Thread), "1000: 4242");
        assert_eq!(node.column_text(WindowColumn::Module), "explorer.exe");
    }

    #[test]
    fn module_column_splits_either_separator_style() {
        let mut windows_style = WindowNode::with_attrs(
            WindowId(10),
            WindowAttrs {
                module_path: CompactString::const_new("C:\\Windows\\System32\\dwm.exe"),
                ..WindowAttrs::default()
            },
        );
        assert_eq!(windows_style.column_text(WindowColumn::Module), "dwm.exe");

        let mut unix_style = WindowNode::with_attrs(
            WindowId(11),
            WindowAttrs {
                module_path: CompactString::const_new("/usr/lib/wine/explorer.exe"),
                ..WindowAttrs::default()
            },
        );
        assert_eq!(unix_style.column_text(WindowColumn::Module), "explorer.exe");

        let mut trailing = WindowNode::with_attrs(
            WindowId(12),
            WindowAttrs {
                module_path: CompactString::const_new("C:\\Windows\\"),
                ..WindowAttrs::default()
            },
        );
        assert_eq!(trailing.column_text(WindowColumn::Module), "");
    }

    #[test]
    fn degraded_attrs_render_empty() {
        let mut node = WindowNode::new(WindowId(2));
        assert_eq!(node.column_text(WindowColumn::Class), "");
        assert_eq!(node.column_text(WindowColumn::Thread), "");
        assert_eq!(node.column_text(WindowColumn::Module), "");
    }

    #[test]
    fn cache_fills_lazily_and_refreshes() {
        let mut node = WindowNode::with_attrs(WindowId(3), sample_attrs());
        assert!(node.cached_text(WindowColumn::Class).is_none());

        let _ = node.column_text(WindowColumn::Class);
        assert_eq!(node.cached_text(WindowColumn::Class), Some("Shell_TrayWnd"));

        // New attrs only take effect through an explicit refresh.
        node.attrs.class_name = CompactString::const_new("Progman");
        assert_eq!(node.cached_text(WindowColumn::Class), Some("Shell_TrayWnd"));

        node.refresh_text();
        assert!(node.cached_text(WindowColumn::Class).is_none());
        assert_eq!(node.column_text(WindowColumn::Class), "Progman");
    }

    #[test]
    fn populate_fills_every_slot() {
        let mut node = WindowNode::with_attrs(WindowId(4), sample_attrs());
        node.populate_text_cache();
        assert_eq!(node.populated_text().count(), 5);
    }
}
