//! The six interposed allocator entry points.
//!
//! Signatures are bit-for-bit the glibc ones; callers are unaware of the
//! substitution and each override returns exactly what the real primitive
//! returned. Shared shape: make sure the real symbols are resolved, perform
//! the real call, then report the outcome to the registry. Deallocating
//! shapes report *before* delegating — the address is dead to the tracker
//! the instant deallocation is requested, which closes the window where a
//! concurrent allocator could reuse it while still marked live.
//!
//! Tracking is off until the init hook has run and permanently off once
//! teardown begins; the registry enforces both via its phase check.

use std::ffi::{c_int, c_void};

use leakscope_core::registry;

use crate::{resolve, stack};

// ---------------------------------------------------------------------------
// malloc
// ---------------------------------------------------------------------------

/// POSIX `malloc` — delegates, then records the allocation on success.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    resolve::ensure_resolved();
    // SAFETY: delegating to the resolved libc malloc.
    let ptr = unsafe { resolve::real_malloc()(size) };
    if !ptr.is_null() {
        registry::global().record(ptr as usize, size, stack::capture);
    }
    ptr
}

// ---------------------------------------------------------------------------
// calloc
// ---------------------------------------------------------------------------

/// POSIX `calloc` — delegates, then records `nmemb * size` on success.
///
/// While the real `calloc` slot is unresolved this returns null instead of
/// resolving inline: `dlsym` may itself call `calloc`, and answering null
/// (indistinguishable from out-of-memory) breaks that bootstrap cycle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    let Some(real_calloc) = resolve::real_calloc_if_resolved() else {
        return std::ptr::null_mut();
    };
    // SAFETY: delegating to the resolved libc calloc.
    let ptr = unsafe { real_calloc(nmemb, size) };
    if !ptr.is_null() {
        // A non-null result implies the exact product fit, so saturation
        // never distorts the recorded size.
        registry::global().record(ptr as usize, nmemb.saturating_mul(size), stack::capture);
    }
    ptr
}

// ---------------------------------------------------------------------------
// realloc
// ---------------------------------------------------------------------------

/// POSIX `realloc` — releases the old address *before* delegating (the real
/// call may move or free it), then records the new extent on success.
///
/// A failed resize therefore leaves the still-live old block untracked;
/// accepted, since the alternative keeps a record for an address the
/// allocator may already have recycled.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    resolve::ensure_resolved();
    if !ptr.is_null() {
        registry::global().release(ptr as usize);
    }
    // SAFETY: delegating to the resolved libc realloc.
    let out = unsafe { resolve::real_realloc()(ptr, size) };
    if !out.is_null() {
        registry::global().record(out as usize, size, stack::capture);
    }
    out
}

// ---------------------------------------------------------------------------
// free
// ---------------------------------------------------------------------------

/// POSIX `free` — releases the address, then delegates.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    resolve::ensure_resolved();
    if !ptr.is_null() {
        registry::global().release(ptr as usize);
    }
    // SAFETY: delegating to the resolved libc free.
    unsafe { resolve::real_free()(ptr) }
}

// ---------------------------------------------------------------------------
// mmap
// ---------------------------------------------------------------------------

/// POSIX `mmap` — delegates, then records `length` on success. Mapped
/// regions are tracked identically to heap allocations; the registry is
/// agnostic to the backing mechanism.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mmap(
    addr: *mut c_void,
    length: usize,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    offset: libc::off_t,
) -> *mut c_void {
    resolve::ensure_resolved();
    // SAFETY: delegating to the resolved libc mmap.
    let out = unsafe { resolve::real_mmap()(addr, length, prot, flags, fd, offset) };
    // mmap reports failure as MAP_FAILED (-1), not null; neither is a
    // trackable success.
    if out != libc::MAP_FAILED && !out.is_null() {
        registry::global().record(out as usize, length, stack::capture);
    }
    out
}

// ---------------------------------------------------------------------------
// munmap
// ---------------------------------------------------------------------------

/// POSIX `munmap` — releases the address, then delegates.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn munmap(addr: *mut c_void, length: usize) -> c_int {
    resolve::ensure_resolved();
    if !addr.is_null() {
        registry::global().release(addr as usize);
    }
    // SAFETY: delegating to the resolved libc munmap.
    unsafe { resolve::real_munmap()(addr, length) }
}
