// ABOUTME: In-memory accessibility tree used by the menu tests
// ABOUTME: Scripts per-process menu bar responses and records every query and press

use crate::menu::ProcessIdentity;
use crate::platform::{ElementAttributes, MenuSource};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct FakeNode {
    attributes: Option<ElementAttributes>,
    children: Vec<usize>,
}

#[derive(Default)]
pub struct FakeMenuSource {
    nodes: Mutex<Vec<FakeNode>>,
    responses: Mutex<HashMap<i32, VecDeque<Vec<usize>>>>,
    queries: Mutex<HashMap<i32, usize>>,
    presses: Mutex<Vec<usize>>,
}

impl FakeMenuSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, node: FakeNode) -> usize {
        let mut nodes = self.nodes.lock().unwrap();
        nodes.push(node);
        nodes.len() - 1
    }

    pub fn item(&self, title: &str) -> usize {
        self.push(FakeNode {
            attributes: Some(ElementAttributes {
                title: title.to_string(),
                ..Default::default()
            }),
            children: Vec::new(),
        })
    }

    pub fn item_with(&self, attributes: ElementAttributes) -> usize {
        self.push(FakeNode {
            attributes: Some(attributes),
            children: Vec::new(),
        })
    }

    /// An element whose title cannot be read.
    pub fn untitled(&self) -> usize {
        self.push(FakeNode::default())
    }

    /// Hangs `items` under `parent` through an intermediate container, the
    /// way real menu bars nest submenus.
    pub fn submenu(&self, parent: usize, items: Vec<usize>) {
        let container = self.push(FakeNode {
            attributes: None,
            children: items,
        });
        self.nodes.lock().unwrap()[parent].children = vec![container];
    }

    /// Menu bars returned by successive queries for `pid`; the last one repeats.
    pub fn respond(&self, pid: i32, bars: Vec<Vec<usize>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(pid, bars.into_iter().collect());
    }

    /// A full menu bar: the leading application menu plus `titles`.
    pub fn bar(&self, titles: &[&str]) -> Vec<usize> {
        let mut bar = vec![self.item("App")];
        bar.extend(titles.iter().map(|title| self.item(title)));
        bar
    }

    pub fn queries(&self, pid: i32) -> usize {
        self.queries.lock().unwrap().get(&pid).copied().unwrap_or(0)
    }

    pub fn presses(&self) -> Vec<usize> {
        self.presses.lock().unwrap().clone()
    }
}

impl MenuSource for FakeMenuSource {
    type Element = usize;

    fn menu_bar_items(&self, process: &ProcessIdentity) -> Vec<usize> {
        *self.queries.lock().unwrap().entry(process.pid).or_insert(0) += 1;

        let mut responses = self.responses.lock().unwrap();
        let Some(queue) = responses.get_mut(&process.pid) else {
            return Vec::new();
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }

    fn children(&self, element: &usize) -> Vec<usize> {
        self.nodes
            .lock()
            .unwrap()
            .get(*element)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn attributes(&self, element: &usize) -> Option<ElementAttributes> {
        self.nodes
            .lock()
            .unwrap()
            .get(*element)
            .and_then(|node| node.attributes.clone())
    }

    fn press(&self, element: &usize) -> bool {
        self.presses.lock().unwrap().push(*element);
        true
    }
}
