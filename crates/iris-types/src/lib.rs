//! Value types shared across the trace inspector core.
//!
//! Command identity ([`CmdId`], [`SubCmdIdx`]), the prefix trie keyed by
//! sub-command paths, and the half-open range types used for command spans
//! and observed guest memory.

#![forbid(unsafe_code)]

mod id;
mod range;
mod subcmd;
mod trie;

pub use id::{ApiId, CmdId};
pub use range::{CmdIdRange, MemoryRange, MemoryRangeList};
pub use subcmd::SubCmdIdx;
pub use trie::SubCmdIdxTrie;
