//! Per-thread re-entrancy guard for registry bookkeeping.
//!
//! The registry's own internal work allocates (map growth, stack copies),
//! and those allocations pass back through the interposed entry points.
//! Without suppression this recurses until stack exhaustion. The flag is
//! thread-local on purpose: a process-wide flag would blind concurrent
//! unrelated threads while one thread is mid-operation.

use std::cell::Cell;

thread_local! {
    // const-init: a lazily-initialized TLS slot would itself allocate on
    // first touch, which happens inside an allocator call.
    static TRACKING_SUSPENDED: Cell<bool> = const { Cell::new(false) };
}

/// RAII token proving the calling thread holds the suppression flag.
///
/// While a `ReentryGuard` is alive, every nested `Registry::record` /
/// `Registry::release` on the same thread returns immediately without
/// recording. Dropping the guard re-enables tracking for the thread.
pub struct ReentryGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ReentryGuard {
    /// Claims the calling thread's suppression flag.
    ///
    /// Returns `None` if the thread is already inside a registry operation.
    #[must_use]
    pub fn try_enter() -> Option<Self> {
        TRACKING_SUSPENDED.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(ReentryGuard {
                    _not_send: std::marker::PhantomData,
                })
            }
        })
    }

    /// True while the calling thread holds a live guard.
    #[must_use]
    pub fn is_suspended() -> bool {
        TRACKING_SUSPENDED.with(Cell::get)
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        TRACKING_SUSPENDED.with(|flag| flag.set(false));
    }
}
