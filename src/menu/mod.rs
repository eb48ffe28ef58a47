// ABOUTME: Menu tree data model for the focused application's menu bar
// ABOUTME: Nodes carry opaque element handles that resolve through a per-pass table, never raw OS pointers

pub mod extract;
pub mod highlight;
pub mod resolver;
#[cfg(test)]
pub(crate) mod testing;

pub use extract::{Extraction, extract_menu_bar};
pub use highlight::HighlightTracker;
pub use resolver::{MenuResolver, ResolverHandle, ResolverPolicy};

use bitflags::bitflags;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::time::Instant;

/// Identifies one running application instance.
#[derive(Debug, Clone)]
pub struct ProcessIdentity {
    pub pid: i32,
    pub bundle_id: Option<String>,
    /// Display name, not part of identity.
    pub name: String,
}

impl ProcessIdentity {
    pub fn new(pid: i32, bundle_id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            pid,
            bundle_id,
            name: name.into(),
        }
    }
}

impl PartialEq for ProcessIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid && self.bundle_id == other.bundle_id
    }
}

impl Eq for ProcessIdentity {}

impl Hash for ProcessIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pid.hash(state);
        self.bundle_id.hash(state);
    }
}

/// Stable within a single extraction pass only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MenuNodeId(pub(crate) u32);

/// Reference to the OS element behind a node: the pass that produced it and a
/// slot in that pass's element table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub(crate) pass: u64,
    pub(crate) slot: u32,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 1 << 0;
        const OPTION = 1 << 1;
        const CONTROL = 1 << 2;
        const COMMAND = 1 << 3;
    }
}

impl KeyModifiers {
    /// Maps `AXMenuItemCmdModifiers`: bit 0 shift, bit 1 option, bit 2
    /// control, bit 3 "no command". Command is implied unless bit 3 is set.
    pub fn from_ax_mask(mask: i64) -> Self {
        let mut modifiers = KeyModifiers::empty();
        if mask & 1 != 0 {
            modifiers |= KeyModifiers::SHIFT;
        }
        if mask & 2 != 0 {
            modifiers |= KeyModifiers::OPTION;
        }
        if mask & 4 != 0 {
            modifiers |= KeyModifiers::CONTROL;
        }
        if mask & 8 == 0 {
            modifiers |= KeyModifiers::COMMAND;
        }
        modifiers
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuNode {
    pub id: MenuNodeId,
    pub title: String,
    pub is_separator: bool,
    pub is_enabled: bool,
    pub key_equivalent: String,
    pub key_modifiers: KeyModifiers,
    pub children: Vec<MenuNode>,
    pub handle: ElementHandle,
}

impl MenuNode {
    pub fn has_submenu(&self) -> bool {
        !self.children.is_empty()
    }

    /// Depth-first search by id.
    pub fn find(&self, id: MenuNodeId) -> Option<&MenuNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(MenuNode::count).sum::<usize>()
    }
}

/// What the view layer renders: the focused process and its top-level items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuSnapshot {
    pub process: Option<ProcessIdentity>,
    pub items: Arc<Vec<MenuNode>>,
    /// When the tree was committed; `None` while nothing is resolved.
    pub resolved_at: Option<Instant>,
}

impl MenuSnapshot {
    pub fn empty(process: Option<ProcessIdentity>) -> Self {
        Self {
            process,
            items: Arc::new(Vec::new()),
            resolved_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
