pub mod csv_report;
pub mod json_report;
pub mod memory;

pub use csv_report::CsvReportSink;
pub use json_report::JsonReportSink;
pub use memory::MemoryReportSink;

use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use inverter_domain::domain::SourceResult;

use crate::{
    pipeline::{Envelope, PipelineError},
    report::{self, BatchReport, SourceOutcome},
};

/// Drains the pipeline into a report.
///
/// Rejected exports become outcomes; other upstream errors (unreadable files)
/// are logged and skipped, since there is no record set to report on.
pub(crate) async fn collect_report<S>(mut input: S, program_id: &str) -> BatchReport
where
    S: Stream<Item = Result<Envelope<SourceResult>, PipelineError>> + Unpin,
{
    let mut outcomes = Vec::new();

    while let Some(item) = input.next().await {
        match item {
            Ok(env) => outcomes.push(SourceOutcome::Processed(env.payload)),
            Err(PipelineError::Rejected { label, error }) => {
                outcomes.push(SourceOutcome::Rejected { label, error });
            }
            Err(e) => {
                tracing::error!(error = %e, "error in upstream pipeline for report sink");
            }
        }
    }

    let report = report::assemble(outcomes, program_id);
    tracing::info!(
        program_id = %report.program_id,
        processed = report.processed().count(),
        rejected = report.rejected().count(),
        "batch complete"
    );
    report
}

/// Per-device tables live in `devices/` so a serial can never shadow a
/// report table.
pub(crate) fn device_dir(dir: &Path) -> Result<PathBuf, PipelineError> {
    let devices = dir.join("devices");
    std::fs::create_dir_all(&devices)
        .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", devices.display())))?;
    Ok(devices)
}

pub(crate) fn format_value(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// File-system safe stem for a per-device output file.
pub(crate) fn file_stem(serial_number: &str) -> String {
    serial_number
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// One stem per processed source, suffixed when two sources share a serial.
pub(crate) fn source_file_stems<'a>(results: impl IntoIterator<Item = &'a SourceResult>) -> Vec<String> {
    let mut used = std::collections::HashSet::new();
    results
        .into_iter()
        .map(|r| {
            let base = file_stem(&r.serial_number);
            let mut stem = base.clone();
            let mut n = 2;
            while !used.insert(stem.clone()) {
                stem = format!("{base}-{n}");
                n += 1;
            }
            stem
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    pub fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("inverter-ingest-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }
}
