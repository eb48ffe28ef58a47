// ABOUTME: Tracks which menu items the pointer is hovering so the view can highlight the open path
// ABOUTME: Leaving an item schedules a short delayed reset that re-hovering cancels

use super::MenuNodeId;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct HighlightTracker {
    path: Vec<MenuNodeId>,
    reset_at: Option<Instant>,
    delay: Duration,
    panel_expanded: bool,
}

impl HighlightTracker {
    pub fn new(delay: Duration) -> Self {
        Self {
            path: Vec::new(),
            reset_at: None,
            delay,
            panel_expanded: false,
        }
    }

    /// Highlighting only happens while the panel is fully expanded.
    pub fn set_panel_expanded(&mut self, expanded: bool) {
        self.panel_expanded = expanded;
        if !expanded {
            self.reset();
        }
    }

    /// Pointer entered a top-level item.
    pub fn hover_item(&mut self, id: MenuNodeId) {
        if !self.panel_expanded {
            return;
        }
        self.reset_at = None;
        if self.path.first() != Some(&id) {
            self.path.clear();
            self.path.push(id);
        }
    }

    /// Pointer entered an item inside the open submenu.
    pub fn hover_child(&mut self, id: MenuNodeId) {
        if !self.panel_expanded || self.path.is_empty() {
            return;
        }
        self.reset_at = None;
        if !self.path.contains(&id) {
            self.path.push(id);
        }
    }

    /// `now` comes from the runtime clock so a paused test clock drives resets.
    pub fn leave_item(&mut self, now: Instant) {
        if !self.panel_expanded {
            return;
        }
        self.reset_at = Some(now + self.delay);
    }

    /// Applies a pending reset whose deadline has passed. Returns whether the
    /// path changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.reset_at {
            Some(deadline) if now >= deadline => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.path.clear();
        self.reset_at = None;
    }

    pub fn is_highlighted(&self, id: MenuNodeId) -> bool {
        self.panel_expanded && self.path.first() == Some(&id)
    }

    pub fn is_in_path(&self, id: MenuNodeId) -> bool {
        self.path.contains(&id)
    }

    pub fn path(&self) -> &[MenuNodeId] {
        &self.path
    }
}

impl Default for HighlightTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_DELAY)
    }
}
