use crate::SubCmdIdx;
use std::collections::HashMap;

/// Prefix tree keyed by [`SubCmdIdx`] path elements.
///
/// Lookups are exact: an internal node that was never assigned a value
/// yields `None` even when descendants hold values.
#[derive(Debug)]
pub struct SubCmdIdxTrie<T> {
    root: Node<T>,
}

#[derive(Debug)]
struct Node<T> {
    value: Option<T>,
    children: HashMap<u64, Node<T>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Node {
            value: None,
            children: HashMap::new(),
        }
    }
}

impl<T> Default for SubCmdIdxTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubCmdIdxTrie<T> {
    pub fn new() -> Self {
        SubCmdIdxTrie {
            root: Node::default(),
        }
    }

    /// Stores `value` at exactly `key`, replacing any previous value there.
    pub fn set(&mut self, key: &SubCmdIdx, value: T) {
        let mut node = &mut self.root;
        for &e in key.elems() {
            node = node.children.entry(e).or_default();
        }
        node.value = Some(value);
    }

    /// The last value stored at exactly `key`.
    pub fn value(&self, key: &SubCmdIdx) -> Option<&T> {
        let mut node = &self.root;
        for &e in key.elems() {
            node = node.children.get(&e)?;
        }
        node.value.as_ref()
    }

    pub fn value_mut(&mut self, key: &SubCmdIdx) -> Option<&mut T> {
        let mut node = &mut self.root;
        for &e in key.elems() {
            node = node.children.get_mut(&e)?;
        }
        node.value.as_mut()
    }
}
