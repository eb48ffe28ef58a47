// ABOUTME: Converts one accessibility menu bar into MenuNode trees in a single blocking pass
// ABOUTME: Skips the application menu and hops through the container element that wraps every submenu

use super::{ElementHandle, KeyModifiers, MenuNode, MenuNodeId, ProcessIdentity};
use crate::platform::{ElementAttributes, MenuSource};

const MAX_DEPTH: usize = 16;

/// Result of one pass: the tree plus the element table its handles index into.
#[derive(Debug, Clone)]
pub struct Extraction<E> {
    pub pass: u64,
    pub items: Vec<MenuNode>,
    pub elements: Vec<E>,
}

impl<E> Extraction<E> {
    pub fn empty(pass: u64) -> Self {
        Self {
            pass,
            items: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn element(&self, handle: ElementHandle) -> Option<&E> {
        if handle.pass != self.pass {
            return None;
        }
        self.elements.get(handle.slot as usize)
    }
}

pub fn extract_menu_bar<S: MenuSource>(
    source: &S,
    process: &ProcessIdentity,
    pass: u64,
) -> Extraction<S::Element> {
    let mut walker = Walker {
        source,
        pass,
        elements: Vec::new(),
    };

    // The first item is the application-name menu.
    let items = source
        .menu_bar_items(process)
        .iter()
        .skip(1)
        .filter_map(|element| walker.convert(element, 0))
        .collect();

    Extraction {
        pass,
        items,
        elements: walker.elements,
    }
}

struct Walker<'a, S: MenuSource> {
    source: &'a S,
    pass: u64,
    elements: Vec<S::Element>,
}

impl<S: MenuSource> Walker<'_, S> {
    fn convert(&mut self, element: &S::Element, depth: usize) -> Option<MenuNode> {
        let attributes = self.source.attributes(element)?;

        let slot = self.elements.len() as u32;
        self.elements.push(element.clone());

        let children = if depth < MAX_DEPTH {
            match self.source.children(element).first() {
                Some(container) => self
                    .source
                    .children(container)
                    .iter()
                    .filter_map(|child| self.convert(child, depth + 1))
                    .collect(),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        Some(node_from(
            attributes,
            children,
            MenuNodeId(slot),
            ElementHandle {
                pass: self.pass,
                slot,
            },
        ))
    }
}

fn node_from(
    attributes: ElementAttributes,
    children: Vec<MenuNode>,
    id: MenuNodeId,
    handle: ElementHandle,
) -> MenuNode {
    let key_equivalent = attributes.command_char.unwrap_or_default();
    let key_modifiers = if key_equivalent.is_empty() {
        KeyModifiers::empty()
    } else {
        attributes
            .command_modifiers
            .map(KeyModifiers::from_ax_mask)
            .unwrap_or(KeyModifiers::COMMAND)
    };

    MenuNode {
        id,
        is_separator: attributes.title.is_empty() || attributes.title == "-",
        title: attributes.title,
        is_enabled: attributes.enabled.unwrap_or(true),
        key_equivalent,
        key_modifiers,
        children,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::testing::FakeMenuSource;

    fn editor() -> ProcessIdentity {
        ProcessIdentity::new(7, Some("com.example.editor".into()), "Editor")
    }

    #[test]
    fn test_skips_application_menu() {
        let source = FakeMenuSource::new();
        let bar = source.bar(&["File", "Edit", "View"]);
        source.respond(7, vec![bar]);

        let extraction = extract_menu_bar(&source, &editor(), 1);

        let titles: Vec<_> = extraction.items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["File", "Edit", "View"]);
    }

    #[test]
    fn test_submenus_descend_through_container() {
        let source = FakeMenuSource::new();
        let bar = source.bar(&["File"]);
        let new = source.item("New");
        let separator = source.item("");
        let recent = source.item("Open Recent");
        let doc = source.item("notes.txt");
        source.submenu(bar[1], vec![new, separator, recent]);
        source.submenu(recent, vec![doc]);
        source.respond(7, vec![bar]);

        let extraction = extract_menu_bar(&source, &editor(), 1);
        let file = &extraction.items[0];

        assert_eq!(file.children.len(), 3);
        assert_eq!(file.children[0].title, "New");
        assert!(file.children[1].is_separator);
        assert_eq!(file.children[2].children[0].title, "notes.txt");
        assert_eq!(file.count(), 5);
    }

    #[test]
    fn test_untitled_items_are_skipped() {
        let source = FakeMenuSource::new();
        let bar = source.bar(&["File"]);
        let ghost = source.untitled();
        let save = source.item("Save");
        source.submenu(bar[1], vec![ghost, save]);
        source.respond(7, vec![bar]);

        let extraction = extract_menu_bar(&source, &editor(), 1);

        assert_eq!(extraction.items[0].children.len(), 1);
        assert_eq!(extraction.items[0].children[0].title, "Save");
    }

    #[test]
    fn test_attributes_map_onto_node() {
        let source = FakeMenuSource::new();
        let bar = source.bar(&["Edit"]);
        let undo = source.item_with(ElementAttributes {
            title: "Undo".into(),
            enabled: Some(false),
            command_char: Some("Z".into()),
            command_modifiers: None,
        });
        let redo = source.item_with(ElementAttributes {
            title: "Redo".into(),
            enabled: None,
            command_char: Some("Z".into()),
            command_modifiers: Some(1),
        });
        let dash = source.item("-");
        source.submenu(bar[1], vec![undo, redo, dash]);
        source.respond(7, vec![bar]);

        let extraction = extract_menu_bar(&source, &editor(), 1);
        let edit = &extraction.items[0];

        assert!(!edit.children[0].is_enabled);
        assert_eq!(edit.children[0].key_equivalent, "Z");
        assert_eq!(edit.children[0].key_modifiers, KeyModifiers::COMMAND);
        assert!(edit.children[1].is_enabled);
        assert_eq!(
            edit.children[1].key_modifiers,
            KeyModifiers::COMMAND | KeyModifiers::SHIFT
        );
        assert!(edit.children[2].is_separator);
        assert_eq!(edit.key_modifiers, KeyModifiers::empty());
    }

    #[test]
    fn test_handles_resolve_to_source_elements() {
        let source = FakeMenuSource::new();
        let bar = source.bar(&["File", "Edit"]);
        let close = source.item("Close");
        source.submenu(bar[1], vec![close]);
        source.respond(7, vec![bar.clone()]);

        let extraction = extract_menu_bar(&source, &editor(), 3);
        let close_node = &extraction.items[0].children[0];

        assert_eq!(extraction.element(close_node.handle), Some(&close));
        assert_eq!(extraction.element(extraction.items[1].handle), Some(&bar[2]));

        let stale = ElementHandle { pass: 2, slot: close_node.handle.slot };
        assert_eq!(extraction.element(stale), None);
    }

    #[test]
    fn test_empty_menu_bar() {
        let source = FakeMenuSource::new();

        let extraction = extract_menu_bar(&source, &editor(), 1);

        assert!(extraction.is_empty());
        assert_eq!(source.queries(7), 1);
    }
}
