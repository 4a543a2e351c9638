//! Snapshot wire format shared by the probe's writer and the offline reader.
//!
//! A snapshot is the raw bytes of `/proc/self/maps`, the `MAP_END\n`
//! sentinel, then one record per surviving allocation. Every field is a
//! native-pointer-width little-endian word:
//!
//! ```text
//! word: size
//! word: address
//! word: depth              (0..=MAX_DEPTH)
//! depth x word: frames     (oldest first)
//! ```
//!
//! There is no record count and no trailing terminator; end-of-file after a
//! complete record is the authoritative end of the snapshot. A partial
//! trailing record is corruption, not EOF.

use std::io::{self, Write};

use thiserror::Error;

/// Stack frames stored per allocation, capped at capture time.
pub const MAX_DEPTH: usize = 64;

/// Separator between the maps section and the record section.
pub const MAP_END: &[u8] = b"MAP_END\n";

/// Width of every serialized field.
pub const WORD: usize = size_of::<usize>();

/// One decoded allocation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakRecord {
    /// Requested byte count; 0 is a valid tracked size.
    pub size: usize,
    /// The allocation address as an integer. Never zero.
    pub address: usize,
    /// Return addresses, oldest frame first. `len() <= MAX_DEPTH`.
    pub stack: Vec<usize>,
}

/// A fully decoded snapshot file.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Verbatim maps section. Empty when the probe could not read
    /// `/proc/self/maps`.
    pub maps_text: Vec<u8>,
    /// Surviving allocations, in the writer's (unspecified) order.
    pub records: Vec<LeakRecord>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("snapshot has no MAP_END sentinel")]
    MissingSentinel,
    #[error("record truncated at byte offset {offset}")]
    TruncatedRecord { offset: usize },
    #[error("record at byte offset {offset} claims depth {depth} (limit {MAX_DEPTH})")]
    DepthOutOfRange { offset: usize, depth: usize },
}

/// Serializes one record to `sink`.
///
/// `stack` longer than [`MAX_DEPTH`] is truncated; the emitted depth always
/// matches the number of frame words that follow it.
pub fn encode_record<W: Write>(
    sink: &mut W,
    size: usize,
    address: usize,
    stack: &[usize],
) -> io::Result<()> {
    let depth = stack.len().min(MAX_DEPTH);
    let mut buf = [0u8; WORD * (3 + MAX_DEPTH)];
    buf[..WORD].copy_from_slice(&size.to_le_bytes());
    buf[WORD..2 * WORD].copy_from_slice(&address.to_le_bytes());
    buf[2 * WORD..3 * WORD].copy_from_slice(&depth.to_le_bytes());
    for (i, frame) in stack[..depth].iter().enumerate() {
        let at = (3 + i) * WORD;
        buf[at..at + WORD].copy_from_slice(&frame.to_le_bytes());
    }
    sink.write_all(&buf[..(3 + depth) * WORD])
}

/// Decodes a complete snapshot image.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, DecodeError> {
    let maps_end = find_sentinel(bytes).ok_or(DecodeError::MissingSentinel)?;
    let maps_text = bytes[..maps_end].to_vec();
    let mut offset = maps_end + MAP_END.len();

    let mut records = Vec::new();
    while offset < bytes.len() {
        let record_start = offset;
        let size = read_word(bytes, &mut offset)
            .ok_or(DecodeError::TruncatedRecord { offset: record_start })?;
        let address = read_word(bytes, &mut offset)
            .ok_or(DecodeError::TruncatedRecord { offset: record_start })?;
        let depth = read_word(bytes, &mut offset)
            .ok_or(DecodeError::TruncatedRecord { offset: record_start })?;
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthOutOfRange {
                offset: record_start,
                depth,
            });
        }
        let mut stack = Vec::with_capacity(depth);
        for _ in 0..depth {
            let frame = read_word(bytes, &mut offset)
                .ok_or(DecodeError::TruncatedRecord { offset: record_start })?;
            stack.push(frame);
        }
        records.push(LeakRecord {
            size,
            address,
            stack,
        });
    }

    Ok(Snapshot { maps_text, records })
}

/// Byte offset of the sentinel, which must sit at the start of a line.
fn find_sentinel(bytes: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    loop {
        let rest = &bytes[line_start..];
        if rest.starts_with(MAP_END) {
            return Some(line_start);
        }
        match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => line_start += nl + 1,
            None => return None,
        }
    }
}

fn read_word(bytes: &[u8], offset: &mut usize) -> Option<usize> {
    let end = offset.checked_add(WORD)?;
    let raw = bytes.get(*offset..end)?;
    *offset = end;
    Some(usize::from_le_bytes(raw.try_into().ok()?))
}
