// All extern "C" exports accept raw pointers from C callers; the registry
// only treats them as opaque integers, so per-function safety docs would be
// redundant boilerplate.
#![allow(clippy::missing_safety_doc)]
//! # leakscope-abi
//!
//! LD_PRELOAD boundary of the leakscope leak probe. This crate produces a
//! `cdylib` (`libleakscope.so`) whose allocator symbols shadow the host
//! libc's when preloaded:
//!
//! ```text
//! host caller -> interposed entry (this crate) -> real libc primitive
//!                                 \-> Registry record/release (leakscope-core)
//! ```
//!
//! The probe is invisible to the host program apart from per-call overhead
//! and the on-exit snapshot file; every entry point returns exactly what the
//! real primitive returned.

pub mod diag;
pub mod resolve;
pub mod stack;

// Gated behind cfg(not(test)) because these modules export #[no_mangle]
// allocator symbols (malloc, free, ...) that would shadow the test binary's
// own allocator, causing infinite recursion in the test runner itself.
#[cfg(not(test))]
pub mod hooks;
#[cfg(not(test))]
pub mod intercept;
