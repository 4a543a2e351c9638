//! Text and JSON rendering of a built report.

use std::io::{self, Write};

use crate::report::LeakReport;

/// Human-readable listing, largest leak first.
pub fn render_text<W: Write>(out: &mut W, report: &LeakReport) -> io::Result<()> {
    writeln!(
        out,
        "{} leaked allocation(s), {} byte(s) total",
        report.total_leaks, report.total_bytes
    )?;
    if report.leaks.len() < report.total_leaks {
        writeln!(out, "showing the {} largest", report.leaks.len())?;
    }
    for leak in &report.leaks {
        writeln!(out)?;
        writeln!(out, "leak of {} byte(s) at {:#x}", leak.size, leak.address)?;
        if leak.frames.is_empty() {
            writeln!(out, "  (no stack captured)")?;
        }
        for (i, frame) in leak.frames.iter().enumerate() {
            match &frame.module {
                Some(module) => {
                    writeln!(out, "  #{i}: {module}+{:#x}", frame.offset)?;
                }
                None => writeln!(out, "  #{i}: {:#x}", frame.address)?,
            }
        }
    }
    Ok(())
}

/// Machine-readable rendering of the same report.
pub fn render_json<W: Write>(out: &mut W, report: &LeakReport) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{AttributedFrame, Leak};

    fn sample() -> LeakReport {
        LeakReport {
            total_bytes: 150,
            total_leaks: 2,
            leaks: vec![Leak {
                size: 100,
                address: 0x5000,
                frames: vec![
                    AttributedFrame {
                        address: 0x1480,
                        module: Some("/usr/bin/target".into()),
                        offset: 0x3480,
                    },
                    AttributedFrame {
                        address: 0x9000,
                        module: None,
                        offset: 0x9000,
                    },
                ],
            }],
        }
    }

    #[test]
    fn text_lists_totals_frames_and_truncation() {
        let mut out = Vec::new();
        render_text(&mut out, &sample()).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("2 leaked allocation(s), 150 byte(s) total"));
        assert!(text.contains("showing the 1 largest"));
        assert!(text.contains("leak of 100 byte(s) at 0x5000"));
        assert!(text.contains("#0: /usr/bin/target+0x3480"));
        assert!(text.contains("#1: 0x9000"));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let mut out = Vec::new();
        render_json(&mut out, &sample()).expect("render");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("parse");
        assert_eq!(value["total_leaks"], 2);
        assert_eq!(value["leaks"][0]["size"], 100);
        assert_eq!(value["leaks"][0]["frames"][1]["module"], serde_json::Value::Null);
    }
}
