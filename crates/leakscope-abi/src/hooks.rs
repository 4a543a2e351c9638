//! Process lifecycle hooks.
//!
//! `.init_array` runs the init hook before any host code executes: it
//! primes symbol resolution and flips the registry to `Active`.
//! `.fini_array` runs the fini hook at normal exit: it flips tracking off
//! first (so snapshot-time allocation activity is never recorded, and the
//! map is stable while iterated), then writes the snapshot. Each hook runs
//! at most once regardless of thread count; neither is guaranteed on
//! abnormal termination by signal.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use leakscope_core::registry;
use leakscope_core::snapshot::{self, DEFAULT_SNAPSHOT_PATH, SnapshotError};

use crate::{diag, resolve};

/// Environment override for the snapshot output path.
pub const SNAPSHOT_ENV: &str = "LEAKSCOPE_SNAPSHOT";

static INIT_RAN: AtomicBool = AtomicBool::new(false);
static FINI_RAN: AtomicBool = AtomicBool::new(false);

#[used]
#[unsafe(link_section = ".init_array")]
static LEAKSCOPE_INIT: unsafe extern "C" fn() = probe_init;

#[used]
#[unsafe(link_section = ".fini_array")]
static LEAKSCOPE_FINI: unsafe extern "C" fn() = probe_fini;

unsafe extern "C" fn probe_init() {
    if INIT_RAN.swap(true, Ordering::AcqRel) {
        return;
    }
    resolve::ensure_resolved();
    // Environment reads allocate; both happen before tracking is enabled.
    diag::init_from_env();
    registry::global().initialize();
    diag::note("tracking enabled");
}

unsafe extern "C" fn probe_fini() {
    if FINI_RAN.swap(true, Ordering::AcqRel) {
        return;
    }
    // Tracking goes off before anything else so the snapshot's own
    // allocations never reach the registry.
    registry::global().shutdown();
    match snapshot::write_snapshot(&snapshot_path(), registry::global()) {
        Ok(stats) => diag::note_snapshot(stats.records, stats.maps_bytes),
        // The host's exit status must not change because a diagnostic file
        // could not be produced; warn and let the process exit normally.
        Err(SnapshotError::Create { .. }) => diag::warn("snapshot output unopenable, skipped"),
        Err(SnapshotError::Write(_)) => diag::warn("snapshot write failed, output incomplete"),
    }
}

fn snapshot_path() -> PathBuf {
    std::env::var_os(SNAPSHOT_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH), PathBuf::from)
}
