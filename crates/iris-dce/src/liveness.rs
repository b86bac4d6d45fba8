use crate::address::StateAddress;

#[derive(Clone, Copy)]
struct Node {
    parent: usize,
    live: bool,
    any_live: bool,
    timestamp: u64,
}

/// Hierarchical live/dead flags with timestamped bulk overrides.
///
/// Marking a node never visits its descendants. A descendant's state is
/// latent: it is defined by the nearest ancestor carrying a newer
/// timestamp than every node on the path below it. This makes marking a
/// whole subtree live or dead O(depth), at the cost of `any_live` staying
/// conservatively true on ancestors of nodes that later died.
pub struct LivenessTree {
    nodes: Vec<Node>,
    clock: u64,
}

impl Default for LivenessTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessTree {
    /// An all-dead tree holding only the root node.
    pub fn new() -> Self {
        LivenessTree {
            nodes: vec![Node {
                parent: 0,
                live: false,
                any_live: false,
                timestamp: 0,
            }],
            clock: 0,
        }
    }

    /// Adds a dead node under `parent` and returns its address.
    ///
    /// # Panics
    /// Panics if `parent` has not been added yet.
    pub fn push(&mut self, parent: StateAddress) -> StateAddress {
        assert!(parent.index() < self.nodes.len(), "unknown parent node");
        let addr = StateAddress::from_index(self.nodes.len());
        self.nodes.push(Node {
            parent: parent.index(),
            live: false,
            any_live: false,
            timestamp: 0,
        });
        addr
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present.
        false
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Node indices from `addr` up to and including the root.
    fn path_to_root(&self, addr: StateAddress) -> Vec<usize> {
        let mut path = vec![addr.index()];
        let mut cur = addr.index();
        loop {
            let parent = self.nodes[cur].parent;
            if parent == cur {
                break;
            }
            path.push(parent);
            cur = parent;
        }
        path
    }

    /// Marks `addr` and its whole subtree live.
    pub fn mark_live(&mut self, addr: StateAddress) {
        let path = self.path_to_root(addr);
        // Materialize latent state along the path, top-down, so that a
        // stale timestamp below an older bulk override cannot shadow the
        // fresh mark afterwards.
        for pair in path.windows(2).rev() {
            let (child, parent) = (pair[0], pair[1]);
            let p = self.nodes[parent];
            if p.timestamp > self.nodes[child].timestamp {
                let c = &mut self.nodes[child];
                c.live = p.live;
                c.any_live = p.live;
                c.timestamp = p.timestamp;
            }
        }
        let ts = self.tick();
        let n = &mut self.nodes[addr.index()];
        n.live = true;
        n.any_live = true;
        n.timestamp = ts;
        for &ancestor in &path[1..] {
            self.nodes[ancestor].any_live = true;
        }
    }

    /// Marks `addr` and its whole subtree dead. Ancestors keep their
    /// `any_live` flags.
    pub fn mark_dead(&mut self, addr: StateAddress) {
        let ts = self.tick();
        let n = &mut self.nodes[addr.index()];
        n.live = false;
        n.any_live = false;
        n.timestamp = ts;
    }

    /// True if `addr` or any node in its subtree is live.
    pub fn is_live(&self, addr: StateAddress) -> bool {
        // Find the deepest chain of strictly-newer overrides above addr;
        // the last link defines the latent state.
        let mut best = addr.index();
        let mut best_ts = self.nodes[best].timestamp;
        let mut cur = addr.index();
        loop {
            let parent = self.nodes[cur].parent;
            if parent == cur {
                break;
            }
            if self.nodes[parent].timestamp > best_ts {
                best = parent;
                best_ts = self.nodes[parent].timestamp;
            }
            cur = parent;
        }
        if best == addr.index() {
            self.nodes[best].any_live
        } else {
            self.nodes[best].live
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Family {
        tree: LivenessTree,
        root: StateAddress,
        child1: StateAddress,
        child2: StateAddress,
        child_a: StateAddress,
        child_b: StateAddress,
    }

    fn family() -> Family {
        let mut tree = LivenessTree::new();
        let root = StateAddress::ROOT;
        let child1 = tree.push(root);
        let child2 = tree.push(root);
        let child_a = tree.push(child1);
        let child_b = tree.push(child1);
        Family {
            tree,
            root,
            child1,
            child2,
            child_a,
            child_b,
        }
    }

    impl Family {
        fn states(&self) -> [bool; 5] {
            [
                self.tree.is_live(self.root),
                self.tree.is_live(self.child1),
                self.tree.is_live(self.child2),
                self.tree.is_live(self.child_a),
                self.tree.is_live(self.child_b),
            ]
        }
    }

    #[test]
    fn starts_all_dead() {
        let f = family();
        assert_eq!(f.states(), [false; 5]);
    }

    #[test]
    fn bulk_override_sequence() {
        let mut f = family();

        f.tree.mark_live(f.child1);
        assert_eq!(f.states(), [true, true, false, true, true]);

        f.tree.mark_dead(f.root);
        f.tree.mark_live(f.child1);
        assert_eq!(f.states(), [true, true, false, true, true]);

        f.tree.mark_live(f.root);
        assert_eq!(f.states(), [true; 5]);

        f.tree.mark_dead(f.child1);
        assert_eq!(f.states(), [true, false, true, false, false]);

        f.tree.mark_dead(f.root);
        assert_eq!(f.states(), [false; 5]);

        f.tree.mark_live(f.child_a);
        assert_eq!(f.states(), [true, true, false, true, false]);
    }

    #[test]
    fn mark_live_revives_every_ancestor() {
        let mut f = family();
        f.tree.mark_dead(f.root);
        f.tree.mark_live(f.child_b);
        assert!(f.tree.is_live(f.child1));
        assert!(f.tree.is_live(f.root));
        assert!(!f.tree.is_live(f.child_a));
    }

    #[test]
    fn mark_dead_kills_descendants_until_overridden() {
        let mut f = family();
        f.tree.mark_live(f.child_a);
        f.tree.mark_dead(f.child1);
        assert!(!f.tree.is_live(f.child_a));
        assert!(!f.tree.is_live(f.child_b));
        f.tree.mark_live(f.root);
        assert!(f.tree.is_live(f.child_a));
        assert!(f.tree.is_live(f.child_b));
    }
}
