use crate::CmdId;
use std::fmt;

/// Path from a top-level command into nested sub-command structure.
///
/// The first element is a [`CmdId`] value; each subsequent element indexes
/// one level deeper (e.g. into a secondary command buffer). Comparison is
/// lexicographic. A `SubCmdIdx` is never empty; `[0]` is a valid index.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubCmdIdx(Vec<u64>);

impl SubCmdIdx {
    /// Builds an index from raw path elements.
    ///
    /// # Panics
    /// Panics if `elems` is empty; an index always names at least a
    /// top-level command.
    pub fn new(elems: Vec<u64>) -> Self {
        assert!(!elems.is_empty(), "SubCmdIdx must not be empty");
        SubCmdIdx(elems)
    }

    pub fn from_cmd(id: CmdId) -> Self {
        SubCmdIdx(vec![id.value()])
    }

    pub fn elems(&self) -> &[u64] {
        &self.0
    }

    /// The top-level command this path descends from.
    pub fn cmd_id(&self) -> CmdId {
        CmdId::new(self.0[0])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// False only for the degenerate case ruled out by construction; kept
    /// for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True when the path names a top-level command directly.
    pub fn is_top_level(&self) -> bool {
        self.0.len() == 1
    }

    /// True when `self` begins with every element of `prefix`.
    pub fn starts_with(&self, prefix: &SubCmdIdx) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// A new index one level deeper.
    pub fn with_child(&self, child: u64) -> Self {
        let mut elems = self.0.clone();
        elems.push(child);
        SubCmdIdx(elems)
    }

    /// The index with the last element removed, or `None` at the top level.
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() == 1 {
            return None;
        }
        Some(SubCmdIdx(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl From<CmdId> for SubCmdIdx {
    fn from(id: CmdId) -> Self {
        SubCmdIdx::from_cmd(id)
    }
}

impl fmt::Debug for SubCmdIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubCmdIdx{:?}", self.0)
    }
}

impl fmt::Display for SubCmdIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{e}")?;
            first = false;
        }
        Ok(())
    }
}
