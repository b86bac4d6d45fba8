//! The open command variant and the seams to per-API collaborators.
//!
//! The core never interprets a command's payload. It sees a record with an
//! id, an owning API, ordered extras and an opaque byte payload; everything
//! API-specific (schema, state semantics, mutation) is supplied by
//! collaborators through the traits in this crate.

#![forbid(unsafe_code)]

mod cmd;
mod footprint;

pub use cmd::{Cmd, CmdExtra, CmdExtras, CmdFlags, CmdObservations, Observation};
pub use footprint::{BehaviorSpec, FootprintProvider, MutationError, Mutator, StateKey};
