//! Snapshot decoding and frame attribution.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use leakscope_core::format::{self, DecodeError};
use leakscope_core::maps::{self, MapEntry};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("reading {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("decoding snapshot: {0}")]
    Decode(#[from] DecodeError),
    #[error("writing report: {0}")]
    Write(#[from] io::Error),
}

/// One stack frame attributed to the mapping that contained it.
#[derive(Debug, Clone, Serialize)]
pub struct AttributedFrame {
    /// The raw return address from the snapshot.
    pub address: usize,
    /// Backing path of the containing mapping, when one was found.
    pub module: Option<String>,
    /// For file-backed mappings, the file offset suitable for `addr2line`;
    /// otherwise the raw address again.
    pub offset: usize,
}

/// One leaked allocation with its attributed stack.
#[derive(Debug, Clone, Serialize)]
pub struct Leak {
    pub size: usize,
    pub address: usize,
    pub frames: Vec<AttributedFrame>,
}

/// The full report: aggregate totals plus the (possibly limited) listing.
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
    /// Sum over every record in the snapshot, not only the ones shown.
    pub total_bytes: usize,
    /// Number of records in the snapshot. Zero is a valid, leak-free run.
    pub total_leaks: usize,
    /// Leaks listed below, largest first.
    pub leaks: Vec<Leak>,
}

impl LeakReport {
    /// Builds a report from a raw snapshot image.
    ///
    /// `limit` keeps only the N largest leaks in the listing; totals always
    /// cover the whole snapshot.
    pub fn from_snapshot_bytes(bytes: &[u8], limit: Option<usize>) -> Result<Self, ReportError> {
        let snapshot = format::decode_snapshot(bytes)?;
        let entries = maps::parse_maps(&String::from_utf8_lossy(&snapshot.maps_text));

        let total_bytes = snapshot.records.iter().map(|r| r.size).sum();
        let total_leaks = snapshot.records.len();

        let mut leaks: Vec<Leak> = snapshot
            .records
            .iter()
            .map(|record| Leak {
                size: record.size,
                address: record.address,
                frames: record
                    .stack
                    .iter()
                    .map(|&addr| attribute(&entries, addr))
                    .collect(),
            })
            .collect();
        leaks.sort_by(|a, b| b.size.cmp(&a.size).then(a.address.cmp(&b.address)));
        if let Some(limit) = limit {
            leaks.truncate(limit);
        }

        Ok(Self {
            total_bytes,
            total_leaks,
            leaks,
        })
    }

    /// Reads and builds a report from a snapshot file.
    pub fn from_file(path: &std::path::Path, limit: Option<usize>) -> Result<Self, ReportError> {
        let bytes = std::fs::read(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_snapshot_bytes(&bytes, limit)
    }
}

/// Attributes one address to the mapping that contains it.
///
/// File-backed mappings yield `module + (addr - start + file offset)` so the
/// result feeds straight into a symbolizer; anonymous or unknown regions
/// keep the raw address as the offset.
#[must_use]
pub fn attribute(entries: &[MapEntry], addr: usize) -> AttributedFrame {
    match maps::find_containing(entries, addr) {
        Some(entry) if entry.is_file_backed() => AttributedFrame {
            address: addr,
            module: entry.path.clone(),
            offset: addr - entry.start + entry.offset,
        },
        Some(entry) => AttributedFrame {
            address: addr,
            module: entry.path.clone(),
            offset: addr,
        },
        None => AttributedFrame {
            address: addr,
            module: None,
            offset: addr,
        },
    }
}
