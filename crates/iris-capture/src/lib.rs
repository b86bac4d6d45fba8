//! Capture model and its pack-stream codec.
//!
//! A [`Capture`] is the immutable in-memory model of one trace: a header,
//! the ordered command list, the merged observed-memory footprint, the set
//! of APIs in use and an optional mid-execution initial state. Captures
//! are built by [`Capture::new`] or decoded from a pack stream by
//! [`import`]; [`export`] writes them back. The process-wide
//! [`CaptureRegistry`] hands out name-keyed handles.

#![forbid(unsafe_code)]

mod capture;
mod decode;
mod encode;
mod error;
mod msg;
mod registry;

pub use capture::{ApiState, Capture, CaptureHeader, InitialState, CURRENT_CAPTURE_VERSION};
pub use decode::{import, FOREIGN_TRACE_MAGIC};
pub use encode::export;
pub use error::CaptureError;
pub use registry::{CaptureHandle, CaptureRegistry};
