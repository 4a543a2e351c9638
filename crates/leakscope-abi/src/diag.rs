//! No-allocation stderr diagnostics.
//!
//! The probe cannot carry an allocating logger: most of its code runs inside
//! allocator calls, and the fatal resolver path runs before a working
//! allocator exists at all. Every line here is assembled in a fixed stack
//! buffer and emitted with a single `libc::write` to fd 2.
//!
//! Routine lines are gated by `LEAKSCOPE_VERBOSE=1`, read once at init.
//! Fatal lines are unconditional.

use std::sync::atomic::{AtomicBool, Ordering};

/// Environment toggle for routine diagnostics.
pub const VERBOSE_ENV: &str = "LEAKSCOPE_VERBOSE";

static VERBOSE: AtomicBool = AtomicBool::new(false);

const PREFIX: &[u8] = b"leakscope: ";
const LINE_CAP: usize = 256;

/// Reads the verbose toggle. Called once from the init hook, before
/// tracking is enabled, so the `std::env` allocation is never recorded.
pub fn init_from_env() {
    let on = matches!(std::env::var(VERBOSE_ENV), Ok(v) if v == "1");
    VERBOSE.store(on, Ordering::Release);
}

#[must_use]
pub fn enabled() -> bool {
    VERBOSE.load(Ordering::Acquire)
}

/// Fixed-capacity line assembler. Overlong content is truncated, never
/// reallocated.
pub(crate) struct LineBuf {
    buf: [u8; LINE_CAP],
    len: usize,
}

impl LineBuf {
    pub(crate) fn new() -> Self {
        let mut line = Self {
            buf: [0; LINE_CAP],
            len: 0,
        };
        line.push_bytes(PREFIX);
        line
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) {
        let take = bytes.len().min(LINE_CAP - 1 - self.len);
        self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.push_bytes(s.as_bytes());
    }

    pub(crate) fn push_usize(&mut self, value: usize) {
        let mut digits = [0u8; 20];
        let mut at = digits.len();
        let mut v = value;
        loop {
            at -= 1;
            digits[at] = b'0' + (v % 10) as u8;
            v /= 10;
            if v == 0 {
                break;
            }
        }
        self.push_bytes(&digits[at..]);
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Appends the newline and writes the whole line in one syscall.
    /// `push_bytes` caps content at `LINE_CAP - 1`, so the newline always
    /// fits even after truncation.
    pub(crate) fn emit(mut self) {
        self.buf[self.len] = b'\n';
        self.len += 1;
        write_stderr(&self.buf[..self.len]);
    }
}

fn write_stderr(bytes: &[u8]) {
    // SAFETY: fd 2 with a valid buffer; a short or failed write is
    // acceptable, diagnostics are best-effort.
    let _ = unsafe { libc::write(2, bytes.as_ptr().cast(), bytes.len()) };
}

/// Routine note, suppressed unless verbose.
pub fn note(msg: &str) {
    if !enabled() {
        return;
    }
    let mut line = LineBuf::new();
    line.push_str(msg);
    line.emit();
}

/// Post-snapshot summary, suppressed unless verbose.
pub fn note_snapshot(records: usize, maps_bytes: usize) {
    if !enabled() {
        return;
    }
    let mut line = LineBuf::new();
    line.push_str("snapshot written: ");
    line.push_usize(records);
    line.push_str(" leaked allocation(s), ");
    line.push_usize(maps_bytes);
    line.push_str(" maps byte(s)");
    line.emit();
}

/// Unconditional warning for snapshot failures at teardown.
pub fn warn(msg: &str) {
    let mut line = LineBuf::new();
    line.push_str(msg);
    line.emit();
}

/// A required real-allocator symbol is missing: there is no safe degraded
/// mode without a working allocator, so the process aborts. `name` is the
/// NUL-terminated symbol name handed to `dlsym`.
pub fn fatal_missing_symbol(name: &[u8]) -> ! {
    let mut line = LineBuf::new();
    line.push_str("fatal: real symbol not found: ");
    let trimmed = name.strip_suffix(b"\0").unwrap_or(name);
    line.push_bytes(trimmed);
    line.emit();
    // SAFETY: process-terminating call, no preconditions.
    unsafe { libc::abort() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_prefix_and_decimal_rendering() {
        let mut line = LineBuf::new();
        line.push_str("snapshot written: ");
        line.push_usize(0);
        line.push_str(" / ");
        line.push_usize(40961);
        assert_eq!(line.as_bytes(), b"leakscope: snapshot written: 0 / 40961");
    }

    #[test]
    fn overlong_content_is_truncated_not_grown() {
        let mut line = LineBuf::new();
        line.push_bytes(&[b'x'; 4096]);
        assert!(line.as_bytes().len() < LINE_CAP);
        line.push_usize(usize::MAX);
        assert!(line.as_bytes().len() < LINE_CAP);
    }

    #[test]
    fn verbose_defaults_off() {
        assert!(!enabled());
    }
}
