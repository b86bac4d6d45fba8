use iris_api::StateKey;
use std::collections::HashMap;

/// Integer handle for an interned [`StateKey`].
///
/// Behaviors reference state by address rather than by pointer, which
/// keeps the footprint free of self-referential lifetimes and makes
/// state comparisons a single integer compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateAddress(u32);

impl StateAddress {
    /// The synthetic root every interned key tree hangs from.
    pub const ROOT: StateAddress = StateAddress(0);

    pub(crate) fn from_index(index: usize) -> Self {
        StateAddress(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Monotone, append-only intern table mapping state keys to addresses.
///
/// A key's parents are interned before the key itself, so a parent's
/// address is always smaller than any descendant's. Addresses are never
/// recycled.
pub struct AddressMap<K> {
    by_key: HashMap<K, StateAddress>,
    /// Parent address per interned address; entry 0 is the root, its own
    /// parent.
    parents: Vec<StateAddress>,
}

impl<K> Default for AddressMap<K> {
    fn default() -> Self {
        AddressMap {
            by_key: HashMap::new(),
            parents: vec![StateAddress::ROOT],
        }
    }
}

impl<K: StateKey> AddressMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The address of `key`, interning it (and its ancestors) on first
    /// sight.
    pub fn intern(&mut self, key: &K) -> StateAddress {
        if let Some(&addr) = self.by_key.get(key) {
            return addr;
        }
        let parent = match key.parent() {
            Some(p) => self.intern(&p),
            None => StateAddress::ROOT,
        };
        let addr = StateAddress::from_index(self.parents.len());
        self.parents.push(parent);
        self.by_key.insert(key.clone(), addr);
        addr
    }

    pub fn parent(&self, addr: StateAddress) -> StateAddress {
        self.parents[addr.index()]
    }

    /// Parent address per address, root first.
    pub fn parents(&self) -> &[StateAddress] {
        &self.parents
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present.
        false
    }
}
