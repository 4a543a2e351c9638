//! # leakscope-core
//!
//! Safe core of the leakscope leak probe: the live-allocation registry, the
//! per-thread re-entrancy guard, the snapshot wire format (encoder and
//! decoder share one constants module), the `/proc/<pid>/maps` parser, and
//! the snapshot writer.
//!
//! No `unsafe` code is permitted at the crate level. All FFI — the
//! interposed allocator entry points, `dlsym`, stack unwinding — lives in
//! `leakscope-abi`, which drives this crate through `Registry`.

pub mod format;
pub mod guard;
pub mod maps;
pub mod registry;
pub mod snapshot;
