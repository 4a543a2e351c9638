//! The authoritative live-allocation map.
//!
//! One `Registry` exists per process (see [`global`]); tests construct their
//! own. The registry observes allocations, it never owns the pointed-to
//! memory — keys are opaque integer addresses.
//!
//! Lifecycle is three monotonic phases held in one atomic:
//! `Uninitialized -> Active -> ShutDown`. Every mutating operation checks
//! the phase first, so entry points interposed before the init hook ran (or
//! after teardown began) silently no-op instead of touching half-built
//! state. Map storage is `Option<HashMap>` behind the lock for the same
//! reason: `None` distinguishes "not yet constructed" from "empty".

use std::collections::HashMap;
use std::io::{self, Write};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::format::{self, MAX_DEPTH};
use crate::guard::ReentryGuard;

/// Registry lifecycle phase. Transitions are monotonic; `ShutDown` is
/// permanent for the rest of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Uninitialized = 0,
    Active = 1,
    ShutDown = 2,
}

/// One currently-live allocation.
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    /// Requested byte count; 0 is tracked like any other size.
    pub size: usize,
    /// The returned pointer as an integer; non-zero by construction.
    pub address: usize,
    /// Raw return addresses, oldest frame first.
    pub stack: Box<[usize]>,
}

/// Concurrently-accessed map from live address to its record.
pub struct Registry {
    phase: AtomicU8,
    live: Mutex<Option<HashMap<usize, AllocationRecord>>>,
}

static GLOBAL: Registry = Registry::new();

/// The process-wide registry driven by the interposed entry points.
#[must_use]
pub fn global() -> &'static Registry {
    &GLOBAL
}

impl Registry {
    /// An uninitialized registry. Both the lock and the atomic are
    /// const-constructible, so the global needs no lazy init (which would
    /// allocate inside an allocator call).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Uninitialized as u8),
            live: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::Acquire) {
            0 => Phase::Uninitialized,
            1 => Phase::Active,
            _ => Phase::ShutDown,
        }
    }

    /// Constructs the map storage and enters `Active`. Idempotent; a
    /// registry that has already shut down stays shut down.
    pub fn initialize(&self) {
        // The map's first buckets are allocated here, under the thread's
        // suppression flag, so the allocation is delegated untracked.
        let _suppress = ReentryGuard::try_enter();
        {
            let mut slot = self.live.lock();
            if slot.is_none() {
                *slot = Some(HashMap::new());
            }
        }
        let _ = self.phase.compare_exchange(
            Phase::Uninitialized as u8,
            Phase::Active as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Permanently disables tracking. Records already held stay in place
    /// for [`Registry::snapshot_and_emit`].
    pub fn shutdown(&self) {
        self.phase.store(Phase::ShutDown as u8, Ordering::Release);
    }

    /// Inserts a record for `address`, capturing the stack via `capture`.
    ///
    /// No-ops unless the phase is `Active`, `address` is non-zero, the
    /// calling thread is not already inside a registry operation, and the
    /// map storage has been constructed. `capture` runs under the
    /// suppression guard, so any allocation the unwinder performs is
    /// delegated untracked rather than recursing back here.
    ///
    /// Duplicate policy is keep-first: a record for an address already
    /// present (allocator reuse never observed as freed) leaves the
    /// existing record untouched.
    pub fn record<F>(&self, address: usize, size: usize, capture: F)
    where
        F: FnOnce(&mut [usize; MAX_DEPTH]) -> usize,
    {
        if self.phase() != Phase::Active || address == 0 {
            return;
        }
        let Some(_guard) = ReentryGuard::try_enter() else {
            return;
        };

        let mut frames = [0usize; MAX_DEPTH];
        let depth = capture(&mut frames).min(MAX_DEPTH);

        let mut slot = self.live.lock();
        let Some(map) = slot.as_mut() else {
            return;
        };
        map.entry(address).or_insert_with(|| AllocationRecord {
            size,
            address,
            stack: frames[..depth].to_vec().into_boxed_slice(),
        });
    }

    /// Removes the record at `address` if present.
    ///
    /// An absent address is a silent no-op — deallocating memory allocated
    /// before tracking began is expected and benign. Same phase and guard
    /// discipline as [`Registry::record`]; the removed record's own buffer
    /// is freed while the guard is held, so that free is not re-tracked.
    pub fn release(&self, address: usize) {
        if self.phase() != Phase::Active {
            return;
        }
        let Some(_guard) = ReentryGuard::try_enter() else {
            return;
        };

        let mut slot = self.live.lock();
        if let Some(map) = slot.as_mut() {
            map.remove(&address);
        }
    }

    /// Serializes every currently-held record to `sink` in unspecified
    /// order. Returns the number of records written.
    pub fn snapshot_and_emit<W: Write>(&self, sink: &mut W) -> io::Result<usize> {
        // Hold the suppression flag for the duration: the sink's own
        // buffering allocates, and that activity must not be recorded.
        let _suppress = ReentryGuard::try_enter();
        let slot = self.live.lock();
        let Some(map) = slot.as_ref() else {
            return Ok(0);
        };
        for rec in map.values() {
            format::encode_record(sink, rec.size, rec.address, &rec.stack)?;
        }
        Ok(map.len())
    }

    /// Number of live records. Zero before initialization.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.lock().as_ref().map_or(0, HashMap::len)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_stack(_frames: &mut [usize; MAX_DEPTH]) -> usize {
        0
    }

    fn fixed_stack(frames: &mut [usize; MAX_DEPTH]) -> usize {
        frames[0] = 0x1111;
        frames[1] = 0x2222;
        2
    }

    fn decoded(reg: &Registry) -> Vec<format::LeakRecord> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(format::MAP_END);
        reg.snapshot_and_emit(&mut bytes).expect("emit");
        format::decode_snapshot(&bytes).expect("decode").records
    }

    #[test]
    fn uninitialized_registry_ignores_tracking_calls() {
        let reg = Registry::new();
        reg.record(0x1000, 16, fixed_stack);
        reg.release(0x1000);
        assert_eq!(reg.phase(), Phase::Uninitialized);
        assert_eq!(reg.live_count(), 0);
    }

    #[test]
    fn record_then_release_leaves_nothing() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x1000, 100, fixed_stack);
        reg.record(0x2000, 50, fixed_stack);
        reg.release(0x1000);
        let records = decoded(&reg);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, 0x2000);
        assert_eq!(records[0].size, 50);
        assert_eq!(records[0].stack, vec![0x1111, 0x2222]);
    }

    #[test]
    fn null_address_is_never_tracked() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0, 64, fixed_stack);
        assert_eq!(reg.live_count(), 0);
    }

    #[test]
    fn zero_size_is_tracked() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x3000, 0, no_stack);
        let records = decoded(&reg);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, 0);
        assert!(records[0].stack.is_empty());
    }

    #[test]
    fn releasing_an_untracked_address_is_a_no_op() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x1000, 8, no_stack);
        reg.release(0xdead_beef);
        assert_eq!(reg.live_count(), 1);
    }

    #[test]
    fn duplicate_record_keeps_the_first_entry() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x1000, 100, fixed_stack);
        reg.record(0x1000, 999, no_stack);
        let records = decoded(&reg);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, 100);
        assert_eq!(records[0].stack.len(), 2);
    }

    #[test]
    fn shutdown_permanently_disables_tracking() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x1000, 8, no_stack);
        reg.shutdown();
        reg.record(0x2000, 8, no_stack);
        reg.release(0x1000);
        assert_eq!(reg.phase(), Phase::ShutDown);
        // Survivors stay visible to the snapshot.
        let records = decoded(&reg);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, 0x1000);
        // Re-initializing after shutdown does not resurrect tracking.
        reg.initialize();
        assert_eq!(reg.phase(), Phase::ShutDown);
    }

    #[test]
    fn nested_record_from_the_capture_path_is_suppressed() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x1000, 16, |frames| {
            // Simulates the unwinder allocating: that allocation re-enters
            // the interception layer, which calls record again.
            reg.record(0x9999, 1, no_stack);
            frames[0] = 0xaaaa;
            1
        });
        let records = decoded(&reg);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, 0x1000);
    }

    #[test]
    fn capture_deeper_than_max_depth_is_capped() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x1000, 16, |frames| {
            for (i, f) in frames.iter_mut().enumerate() {
                *f = i + 1;
            }
            // A buggy capturer over-reporting depth must not over-read.
            MAX_DEPTH + 5
        });
        let records = decoded(&reg);
        assert_eq!(records[0].stack.len(), MAX_DEPTH);
    }
}
