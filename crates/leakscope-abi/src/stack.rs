//! Call-stack capture at the moment an allocation is confirmed.
//!
//! Best-effort: the unwinder may stop early or find nothing, and a depth of
//! 0 is a valid result that never aborts tracking. The capturer always runs
//! inside the registry's suppression guard (it is handed to
//! `Registry::record` as the capture callback), so any allocation the
//! unwinder performs on first use is delegated untracked.

use leakscope_core::format::MAX_DEPTH;

/// Fills `frames` with up to [`MAX_DEPTH`] instruction pointers and returns
/// the captured depth. Stored order is oldest frame first, matching the
/// snapshot wire format; the unwinder's innermost-first order is reversed
/// here, at capture time.
pub fn capture(frames: &mut [usize; MAX_DEPTH]) -> usize {
    let mut depth = 0;
    backtrace::trace(|frame| {
        frames[depth] = frame.ip() as usize;
        depth += 1;
        depth < MAX_DEPTH
    });
    frames[..depth].reverse();
    depth
}
