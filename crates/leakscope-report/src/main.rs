//! CLI entrypoint for the leakscope snapshot reader.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;

use leakscope_core::snapshot::DEFAULT_SNAPSHOT_PATH;
use leakscope_report::{LeakReport, ReportError, render};

/// Decode a leakscope snapshot and render a leak report.
#[derive(Debug, Parser)]
#[command(name = "leakscope-report")]
#[command(about = "Offline reader for leakscope snapshot files")]
struct Cli {
    /// Snapshot file written by the probe.
    #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
    dumpfile: PathBuf,
    /// Show at most this many leaks (largest first). Totals always cover
    /// the whole snapshot.
    #[arg(long)]
    limit: Option<usize>,
    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
    /// Write the report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<(), ReportError> {
    let report = LeakReport::from_file(&cli.dumpfile, cli.limit)?;

    let mut sink: BufWriter<Box<dyn Write>> = match &cli.output {
        Some(path) => BufWriter::new(Box::new(File::create(path).map_err(ReportError::Write)?)),
        None => BufWriter::new(Box::new(io::stdout())),
    };

    if cli.json {
        render::render_json(&mut sink, &report)?;
    } else {
        render::render_text(&mut sink, &report)?;
    }
    sink.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    // An empty record list is a valid, leak-free run; only I/O and decode
    // failures exit non-zero.
    if let Err(err) = run(&cli) {
        eprintln!("leakscope-report: {err}");
        std::process::exit(1);
    }
}
