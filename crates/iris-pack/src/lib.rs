//! Framed "pack" record stream.
//!
//! A pack stream is a magic prefix, a versioned header, then a sequence of
//! tagged records: standalone objects, nestable groups, and child objects
//! referencing an open group. The codec is streaming in both directions:
//! the writer emits records as they are produced and the reader yields
//! events in document order without buffering the stream.
//!
//! Layout (little-endian, LEB128 varints):
//!
//! ```text
//! magic    : 8 bytes  "irispak\0"
//! header   : major u16, minor u16
//! record   : tag u8, then per tag:
//!   0x00 Object                  msg
//!   0x01 BeginGroup              msg            (allocates the next id)
//!   0x02 BeginChildGroup         parent, msg    (allocates the next id)
//!   0x03 ChildObject             parent, msg
//!   0x04 EndGroup                id
//!   0x05 EndGroupNonTerminated   id
//! msg      : msg_type varint, len varint, len bytes
//! ```
//!
//! Group ids are locally unique within a stream, allocated 1, 2, 3... in
//! `BeginGroup`/`BeginChildGroup` order on both sides of the wire.

#![forbid(unsafe_code)]

mod reader;
pub mod varint;
mod writer;

pub use reader::{Event, Reader};
pub use writer::Writer;

use std::io;

pub const MAGIC: [u8; 8] = *b"irispak\0";
pub const MAJOR_VERSION: u16 = 1;
pub const MINOR_VERSION: u16 = 0;
/// Oldest major this reader still understands.
pub const MIN_MAJOR_VERSION: u16 = 1;

/// Upper bound on a single message payload. The length field comes from
/// untrusted input and is otherwise used directly for allocation.
pub const MAX_MSG_SIZE: u64 = 256 << 20;

/// A typed message payload carried by a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub msg_type: u64,
    pub bytes: Vec<u8>,
}

impl Message {
    pub fn new(msg_type: u64, bytes: Vec<u8>) -> Self {
        Message { msg_type, bytes }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("stream is not a pack stream (bad magic)")]
    InvalidMagic,

    #[error("pack stream ends before a complete header")]
    MissingHeader,

    #[error("pack version {major}.{minor} is too new (newest supported major is {supported})")]
    VersionTooNew { major: u16, minor: u16, supported: u16 },

    #[error("pack version {major}.{minor} is too old (oldest supported major is {supported})")]
    VersionTooOld { major: u16, minor: u16, supported: u16 },

    #[error("malformed record at offset {offset}: {reason}")]
    BadRecord { offset: u64, reason: &'static str },

    #[error("record at offset {offset} references group {id}, which is not open")]
    UnknownGroup { id: u64, offset: u64 },

    #[error("group {id} is not open")]
    GroupNotOpen { id: u64 },

    #[error("stream ended with {count} unclosed group(s)")]
    UnclosedGroups { count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub(crate) mod tag {
    pub const OBJECT: u8 = 0x00;
    pub const BEGIN_GROUP: u8 = 0x01;
    pub const BEGIN_CHILD_GROUP: u8 = 0x02;
    pub const CHILD_OBJECT: u8 = 0x03;
    pub const END_GROUP: u8 = 0x04;
    pub const END_GROUP_NON_TERMINATED: u8 = 0x05;
}
