//! On-exit snapshot writer.
//!
//! Writes the maps section, the sentinel, then every surviving registry
//! record. Failure to open the output abandons the snapshot step only; the
//! host process still exits normally. Failure to read the maps source
//! degrades to an empty maps section.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::format::MAP_END;
use crate::registry::Registry;

/// Output path used when the probe is given no override.
pub const DEFAULT_SNAPSHOT_PATH: &str = "/tmp/leakscope.dump";

/// Maps source for the calling process.
pub const PROC_SELF_MAPS: &str = "/proc/self/maps";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("creating snapshot output {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing snapshot: {0}")]
    Write(#[from] std::io::Error),
}

/// What a completed snapshot contained, for the probe's summary line.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotStats {
    /// Bytes of maps text written before the sentinel.
    pub maps_bytes: usize,
    /// Allocation records written after it.
    pub records: usize,
}

/// Writes a full snapshot image to `sink`.
pub fn write_snapshot_to<W: Write>(
    sink: &mut W,
    maps: &[u8],
    registry: &Registry,
) -> Result<SnapshotStats, SnapshotError> {
    sink.write_all(maps)?;
    sink.write_all(MAP_END)?;
    let records = registry.snapshot_and_emit(sink)?;
    Ok(SnapshotStats {
        maps_bytes: maps.len(),
        records,
    })
}

/// Opens `path` and writes the snapshot for `registry`, reading the maps
/// text from [`PROC_SELF_MAPS`]. An unreadable maps source is tolerated;
/// the maps section is then empty.
pub fn write_snapshot(path: &Path, registry: &Registry) -> Result<SnapshotStats, SnapshotError> {
    let maps = fs::read(PROC_SELF_MAPS).unwrap_or_default();
    let file = File::create(path).map_err(|source| SnapshotError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut sink = BufWriter::new(file);
    let stats = write_snapshot_to(&mut sink, &maps, registry)?;
    sink.flush()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{self, MAX_DEPTH};

    fn stack_of(frames: &[usize]) -> impl Fn(&mut [usize; MAX_DEPTH]) -> usize + '_ {
        move |buf| {
            buf[..frames.len()].copy_from_slice(frames);
            frames.len()
        }
    }

    #[test]
    fn sink_snapshot_holds_maps_sentinel_and_records() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x1000, 100, stack_of(&[0xa, 0xb]));
        reg.shutdown();

        let maps = b"10-20 r-xp 00000000 08:01 1 /bin/x\n";
        let mut out = Vec::new();
        let stats = write_snapshot_to(&mut out, maps, &reg).expect("write");
        assert_eq!(stats.maps_bytes, maps.len());
        assert_eq!(stats.records, 1);

        let snap = format::decode_snapshot(&out).expect("decode");
        assert_eq!(snap.maps_text, maps);
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.records[0].stack, vec![0xa, 0xb]);
    }

    #[test]
    fn empty_maps_section_still_produces_a_decodable_snapshot() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x2000, 8, stack_of(&[]));

        let mut out = Vec::new();
        let stats = write_snapshot_to(&mut out, b"", &reg).expect("write");
        assert_eq!(stats.maps_bytes, 0);
        let snap = format::decode_snapshot(&out).expect("decode");
        assert!(snap.maps_text.is_empty());
        assert_eq!(snap.records.len(), 1);
    }

    #[test]
    fn unopenable_output_reports_create_with_the_path() {
        let reg = Registry::new();
        reg.initialize();
        let path = Path::new("/nonexistent-dir/leakscope.dump");
        let err = write_snapshot(path, &reg).unwrap_err();
        match err {
            SnapshotError::Create { path: p, .. } => {
                assert_eq!(p, path);
            }
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn file_snapshot_reads_the_process_maps() {
        let reg = Registry::new();
        reg.initialize();
        reg.record(0x3000, 42, stack_of(&[0x1]));
        reg.shutdown();

        let path = std::env::temp_dir().join(format!(
            "leakscope-snapshot-test-{}.dump",
            std::process::id()
        ));
        let stats = write_snapshot(&path, &reg).expect("write");
        assert_eq!(stats.records, 1);
        // The test process has a real maps file.
        assert!(stats.maps_bytes > 0);

        let bytes = fs::read(&path).expect("read back");
        let snap = format::decode_snapshot(&bytes).expect("decode");
        assert_eq!(snap.records.len(), 1);
        assert_eq!(snap.records[0].size, 42);
        let _ = fs::remove_file(&path);
    }
}
