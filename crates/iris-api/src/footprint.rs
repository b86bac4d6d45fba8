use crate::Cmd;
use iris_task::Context;
use iris_types::{ApiId, CmdId, SubCmdIdx};
use std::hash::Hash;

/// Identity of a piece of abstract API state.
///
/// Keys form a tree: `parent()` is `None` at a root. The footprint interns
/// keys by value into compact state addresses, so keys must be cheap to
/// clone and hash.
pub trait StateKey: Clone + Eq + Hash {
    fn parent(&self) -> Option<Self>;
}

/// What one (sub-)command does to abstract state, as reported by a
/// per-API collaborator.
#[derive(Clone, Debug)]
pub struct BehaviorSpec<K> {
    pub reads: Vec<K>,
    pub modifies: Vec<K>,
    pub writes: Vec<K>,
    /// The command must survive DCE regardless of dependencies.
    pub keep_alive: bool,
    /// The command failed during capture; it neither stays live nor
    /// propagates dependencies.
    pub aborted: bool,
}

impl<K> Default for BehaviorSpec<K> {
    fn default() -> Self {
        BehaviorSpec {
            reads: Vec::new(),
            modifies: Vec::new(),
            writes: Vec::new(),
            keep_alive: false,
            aborted: false,
        }
    }
}

impl<K> BehaviorSpec<K> {
    pub fn keep_alive() -> Self
    where
        K: Clone,
    {
        BehaviorSpec {
            reads: Vec::new(),
            modifies: Vec::new(),
            writes: Vec::new(),
            keep_alive: true,
            aborted: false,
        }
    }
}

/// Per-API collaborator describing command dependencies.
///
/// Returning `None` refuses the command: the footprint then keeps it alive
/// unconditionally and still mutates it through the running state.
pub trait FootprintProvider<K: StateKey> {
    fn api(&self) -> ApiId;
    fn behavior(&self, ctx: &Context, idx: &SubCmdIdx, cmd: &Cmd) -> Option<BehaviorSpec<K>>;
}

#[derive(Debug, thiserror::Error)]
#[error("mutation of command {id} failed: {reason}")]
pub struct MutationError {
    pub id: CmdId,
    pub reason: String,
}

/// Applies a command's side effects to the running state so later
/// commands (possibly of other APIs) observe them.
pub trait Mutator {
    fn mutate(&mut self, ctx: &Context, id: CmdId, cmd: &Cmd) -> Result<(), MutationError>;
}
