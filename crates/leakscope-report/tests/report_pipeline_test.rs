//! End-to-end reader pipeline over synthetic snapshots built with the core
//! encoder, the same code path the probe's writer uses.

use leakscope_core::format::{MAP_END, encode_record};
use leakscope_core::registry::Registry;
use leakscope_core::snapshot::write_snapshot_to;
use leakscope_report::{LeakReport, ReportError, render};

const MAPS: &[u8] = b"\
1000-2000 r-xp 00003000 08:01 7 /usr/bin/target
2000-3000 rw-p 00000000 00:00 0 [heap]
";

fn synthetic_snapshot(records: &[(usize, usize, &[usize])]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(MAPS);
    bytes.extend_from_slice(MAP_END);
    for &(size, address, stack) in records {
        encode_record(&mut bytes, size, address, stack).expect("encode");
    }
    bytes
}

#[test]
fn report_attributes_sorts_and_aggregates() {
    let bytes = synthetic_snapshot(&[
        (50, 0x2100, &[0x1480][..]),
        (100, 0x2200, &[0x1490, 0x9000][..]),
    ]);

    let report = LeakReport::from_snapshot_bytes(&bytes, None).expect("build");
    assert_eq!(report.total_leaks, 2);
    assert_eq!(report.total_bytes, 150);

    // Largest first.
    assert_eq!(report.leaks[0].size, 100);
    assert_eq!(report.leaks[0].address, 0x2200);
    let frame = &report.leaks[0].frames[0];
    assert_eq!(frame.module.as_deref(), Some("/usr/bin/target"));
    assert_eq!(frame.offset, 0x490 + 0x3000);
    assert_eq!(report.leaks[0].frames[1].module, None);
}

#[test]
fn limit_truncates_the_listing_but_not_the_totals() {
    let bytes = synthetic_snapshot(&[
        (10, 0x2100, &[][..]),
        (30, 0x2200, &[][..]),
        (20, 0x2300, &[][..]),
    ]);
    let report = LeakReport::from_snapshot_bytes(&bytes, Some(1)).expect("build");
    assert_eq!(report.total_leaks, 3);
    assert_eq!(report.total_bytes, 60);
    assert_eq!(report.leaks.len(), 1);
    assert_eq!(report.leaks[0].size, 30);
}

#[test]
fn empty_record_list_is_a_valid_leak_free_run() {
    let bytes = synthetic_snapshot(&[]);
    let report = LeakReport::from_snapshot_bytes(&bytes, None).expect("build");
    assert_eq!(report.total_leaks, 0);
    assert_eq!(report.total_bytes, 0);

    let mut out = Vec::new();
    render::render_text(&mut out, &report).expect("render");
    assert!(String::from_utf8(out).expect("utf8").contains("0 leaked"));
}

#[test]
fn corrupt_snapshot_surfaces_a_decode_error() {
    let mut bytes = synthetic_snapshot(&[(10, 0x2100, &[0x1, 0x2][..])]);
    bytes.truncate(bytes.len() - 3);
    let err = LeakReport::from_snapshot_bytes(&bytes, None).unwrap_err();
    assert!(matches!(err, ReportError::Decode(_)));
}

#[test]
fn reader_consumes_what_the_registry_writer_produces() {
    let registry = Registry::new();
    registry.initialize();
    registry.record(0x2100, 64, |frames| {
        frames[0] = 0x1480;
        frames[1] = 0x14a0;
        2
    });
    registry.shutdown();

    let mut bytes = Vec::new();
    write_snapshot_to(&mut bytes, MAPS, &registry).expect("write");

    let report = LeakReport::from_snapshot_bytes(&bytes, None).expect("build");
    assert_eq!(report.total_leaks, 1);
    assert_eq!(report.leaks[0].size, 64);
    assert_eq!(report.leaks[0].frames.len(), 2);
    assert_eq!(
        report.leaks[0].frames[0].module.as_deref(),
        Some("/usr/bin/target")
    );

    let mut json = Vec::new();
    render::render_json(&mut json, &report).expect("render");
    let value: serde_json::Value = serde_json::from_slice(&json).expect("parse");
    assert_eq!(value["total_leaks"], 1);
}
