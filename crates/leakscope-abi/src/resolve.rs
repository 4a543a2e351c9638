//! Resolution of the real (non-interposed) allocator primitives.
//!
//! When the probe's symbols shadow libc's, the overrides still need the
//! genuine behavior. Each real function lives in a process-wide `AtomicPtr`
//! slot populated once via `dlsym(RTLD_NEXT, ..)`; first successful
//! resolution wins and slots are thereafter only read, so no lock exists on
//! this path (and no lock ordering with the registry's lock can arise).
//!
//! A missing symbol is fatal: the process cannot run without a real
//! allocator, so the failure path writes a raw stderr line and aborts.

use std::ffi::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use crate::diag;

pub type MallocFn = unsafe extern "C" fn(usize) -> *mut c_void;
pub type CallocFn = unsafe extern "C" fn(usize, usize) -> *mut c_void;
pub type ReallocFn = unsafe extern "C" fn(*mut c_void, usize) -> *mut c_void;
pub type FreeFn = unsafe extern "C" fn(*mut c_void);
pub type MmapFn =
    unsafe extern "C" fn(*mut c_void, usize, c_int, c_int, c_int, libc::off_t) -> *mut c_void;
pub type MunmapFn = unsafe extern "C" fn(*mut c_void, usize) -> c_int;

static RESOLVED: AtomicBool = AtomicBool::new(false);

static REAL_MALLOC: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static REAL_CALLOC: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static REAL_REALLOC: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static REAL_FREE: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static REAL_MMAP: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static REAL_MUNMAP: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

fn resolve_slot(slot: &AtomicPtr<c_void>, name: &'static [u8]) {
    if !slot.load(Ordering::Acquire).is_null() {
        return;
    }
    // SAFETY: `name` is a static NUL-terminated symbol name; RTLD_NEXT asks
    // the dynamic linker for the binding after this object, i.e. the real
    // libc function the probe is shadowing.
    let found = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr().cast()) };
    if found.is_null() {
        diag::fatal_missing_symbol(name);
    }
    // First successful resolution wins; a concurrent winner is identical
    // anyway (the linker returns the same binding), so the losing value is
    // simply dropped.
    let _ = slot.compare_exchange(ptr::null_mut(), found, Ordering::AcqRel, Ordering::Acquire);
}

/// Resolves every real primitive at most once. Idempotent and safe to call
/// from each intercepted entry point.
pub fn ensure_resolved() {
    if RESOLVED.load(Ordering::Acquire) {
        return;
    }
    resolve_slot(&REAL_MALLOC, b"malloc\0");
    resolve_slot(&REAL_CALLOC, b"calloc\0");
    resolve_slot(&REAL_REALLOC, b"realloc\0");
    resolve_slot(&REAL_FREE, b"free\0");
    resolve_slot(&REAL_MMAP, b"mmap\0");
    resolve_slot(&REAL_MUNMAP, b"munmap\0");
    RESOLVED.store(true, Ordering::Release);
}

/// True once every slot has been populated.
#[must_use]
pub fn is_resolved() -> bool {
    RESOLVED.load(Ordering::Acquire)
}

macro_rules! real_accessor {
    ($(#[$doc:meta])* $name:ident, $slot:ident, $ty:ty) => {
        $(#[$doc])*
        #[must_use]
        pub fn $name() -> $ty {
            let p = $slot.load(Ordering::Acquire);
            debug_assert!(!p.is_null(), "accessor used before ensure_resolved");
            // SAFETY: the slot was populated from dlsym with the matching
            // libc signature; callers go through ensure_resolved first.
            unsafe { std::mem::transmute::<*mut c_void, $ty>(p) }
        }
    };
}

real_accessor!(
    /// The real `malloc`. Call [`ensure_resolved`] first.
    real_malloc, REAL_MALLOC, MallocFn
);
real_accessor!(
    /// The real `realloc`. Call [`ensure_resolved`] first.
    real_realloc, REAL_REALLOC, ReallocFn
);
real_accessor!(
    /// The real `free`. Call [`ensure_resolved`] first.
    real_free, REAL_FREE, FreeFn
);
real_accessor!(
    /// The real `mmap`. Call [`ensure_resolved`] first.
    real_mmap, REAL_MMAP, MmapFn
);
real_accessor!(
    /// The real `munmap`. Call [`ensure_resolved`] first.
    real_munmap, REAL_MUNMAP, MunmapFn
);

/// The real `calloc`, or `None` while its slot is still empty.
///
/// `dlsym` itself may call `calloc` during resolution; the interposed
/// `calloc` breaks that bootstrap cycle by answering null (mirroring
/// out-of-memory) instead of resolving inline, so it needs a non-fatal
/// probe of the slot.
#[must_use]
pub fn real_calloc_if_resolved() -> Option<CallocFn> {
    let p = REAL_CALLOC.load(Ordering::Acquire);
    if p.is_null() {
        None
    } else {
        // SAFETY: populated from dlsym with the calloc signature.
        Some(unsafe { std::mem::transmute::<*mut c_void, CallocFn>(p) })
    }
}
