//! Ordered tree of command groups.
//!
//! A [`CmdIdGroup`] partitions a flat command range into labelled, possibly
//! nested intervals for presentation and navigation. Sibling spans are kept
//! sorted by start and never overlap; gaps are legal and represent
//! "no command" areas at that level.

#![forbid(unsafe_code)]

mod group;
mod span;

pub use group::{CmdIdGroup, GroupError};
pub use span::{Span, SpanItem};
