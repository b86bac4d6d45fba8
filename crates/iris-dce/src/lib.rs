//! Dependency footprint and dead-code elimination.
//!
//! The footprint records, per command, a [`Behavior`]: which pieces of
//! abstract API state the command reads, modifies and writes, with state
//! keys interned to compact [`StateAddress`] handles. [`DcePass`] walks
//! behaviors backwards from a set of requested commands, propagating
//! liveness through a [`LivenessTree`], and emits the minimal command
//! sequence that reproduces the requested state.

#![forbid(unsafe_code)]

mod address;
mod dce;
mod footprint;
mod liveness;

pub use address::{AddressMap, StateAddress};
pub use dce::{DcePass, DceResult, DceStats};
pub use footprint::{Behavior, Footprint};
pub use liveness::LivenessTree;
