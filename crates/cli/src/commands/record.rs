//! `record` command implementation.

use anyhow::{Context, Result};
use capture::{write_dump, SyntheticReports, REPORT_RATE_HZ};
use tracing::info;

use crate::cli::RecordArgs;

/// Execute the `record` command
pub fn run_record(args: &RecordArgs) -> Result<()> {
    let generator = SyntheticReports {
        sync_every: args.sync_every,
        corrupt_every: args.corrupt_every,
        ..Default::default()
    };

    let written = write_dump(&args.output, (0..args.reports).map(|n| generator.bytes(n)))
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        path = %args.output.display(),
        reports = written,
        "Synthetic dump written"
    );
    println!(
        "Wrote {} reports ({:.1}s at {} Hz) to {}",
        written,
        written as f64 / REPORT_RATE_HZ,
        REPORT_RATE_HZ,
        args.output.display()
    );
    Ok(())
}
