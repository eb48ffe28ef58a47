// ABOUTME: Estimates how wide the top-level menu row renders so the panel can size itself to it
// ABOUTME: Stands in for view measurement with a fixed per-glyph advance and per-item padding

use crate::menu::{MenuNode, MenuSnapshot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Average advance of one glyph at the menu font size.
    pub glyph_width: f64,
    /// Horizontal padding on each side of an item.
    pub item_padding: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            glyph_width: 7.0,
            item_padding: 12.0,
        }
    }
}

impl TextMetrics {
    pub fn item_width(&self, node: &MenuNode) -> f64 {
        if node.is_separator {
            return 0.0;
        }
        let glyphs = node.title.chars().count() as f64;
        glyphs * self.glyph_width + self.item_padding * 2.0
    }

    pub fn row_width(&self, items: &[MenuNode]) -> f64 {
        items.iter().map(|node| self.item_width(node)).sum()
    }

    /// `None` for an empty menu so the panel keeps its template width.
    pub fn preferred_width(&self, snapshot: &MenuSnapshot) -> Option<f64> {
        if snapshot.is_empty() {
            return None;
        }
        Some(self.row_width(&snapshot.items))
    }
}
