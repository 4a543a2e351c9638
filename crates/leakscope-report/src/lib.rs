//! # leakscope-report
//!
//! Offline reader for snapshot files written by the leakscope probe. The
//! probe stores raw return addresses plus the raw memory-map text; this
//! tool attributes each address to its containing mapping (module + offset)
//! and renders a per-leak listing, leaving symbolization of module offsets
//! to `addr2line` and friends.
//!
//! The probe never depends on this crate.

pub mod render;
pub mod report;

pub use report::{AttributedFrame, Leak, LeakReport, ReportError};
