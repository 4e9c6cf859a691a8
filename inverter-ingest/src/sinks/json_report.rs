use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use futures::Stream;
use inverter_domain::domain::SourceResult;
use serde::Serialize;

use super::{collect_report, device_dir, source_file_stems};
use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    report::{BatchReport, SourceOutcome},
};

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    source: &'a str,
    status: &'static str,
    serial_number: Option<&'a str>,
    reason: Option<&'static str>,
    column: Option<&'a str>,
    message: Option<String>,
}

impl<'a> From<&'a SourceOutcome> for OutcomeRecord<'a> {
    fn from(outcome: &'a SourceOutcome) -> Self {
        match outcome {
            SourceOutcome::Processed(r) => OutcomeRecord {
                source: &r.label,
                status: "processed",
                serial_number: Some(r.serial_number.as_str()),
                reason: None,
                column: None,
                message: None,
            },
            SourceOutcome::Rejected { label, error } => OutcomeRecord {
                source: label,
                status: "rejected",
                serial_number: None,
                reason: Some(error.kind()),
                column: error.column(),
                message: Some(error.to_string()),
            },
        }
    }
}

/// Writes the report as pretty-printed JSON under `dir`, one file per table,
/// with the same layout as the CSV sink.
pub struct JsonReportSink {
    dir: PathBuf,
    program_id: String,
}

impl JsonReportSink {
    pub fn new<D: Into<PathBuf>, P: Into<String>>(dir: D, program_id: P) -> Self {
        Self {
            dir: dir.into(),
            program_id: program_id.into(),
        }
    }

    fn write_report(&self, report: &BatchReport) -> Result<u64, PipelineError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", self.dir.display())))?;

        let mut rows = 0u64;
        let processed: Vec<&SourceResult> = report.processed().collect();
        if !processed.is_empty() {
            let devices = device_dir(&self.dir)?;
            for (result, stem) in processed.iter().zip(source_file_stems(processed.iter().copied())) {
                write_json(&devices.join(format!("{stem}.json")), result)?;
                rows += result.points.len() as u64;
            }
        }

        let outcomes: Vec<OutcomeRecord<'_>> = report.outcomes.iter().map(OutcomeRecord::from).collect();
        write_json(&self.dir.join("sources.json"), &outcomes)?;
        rows += outcomes.len() as u64;

        if let Ok(tables) = &report.tables {
            write_json(&self.dir.join("combined.json"), &tables.combined)?;
            write_json(&self.dir.join("totals.json"), &tables.totals)?;
            rows += (tables.combined.rows.len() + tables.totals.rows.len()) as u64;
        }

        Ok(rows)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let file = File::create(path)
        .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(|e| PipelineError::Sink(format!("failed to encode {}: {e}", path.display())))?;
    out.flush()
        .map_err(|e| PipelineError::Sink(format!("failed to flush {}: {e}", path.display())))
}

#[async_trait::async_trait]
impl Sink<SourceResult> for JsonReportSink {
    type Output = BatchReport;

    async fn run<S>(&self, input: S) -> Result<BatchReport, PipelineError>
    where
        S: Stream<Item = Result<Envelope<SourceResult>, PipelineError>> + Send + Unpin + 'static,
    {
        let report = collect_report(input, &self.program_id).await;

        match self.write_report(&report) {
            Ok(rows) => {
                metrics::counter!("inverter_report_rows_written_total").increment(rows);
                tracing::info!(dir = %self.dir.display(), rows, "json report written");
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "json report sink failed");
                Err(e)
            }
        }
    }
}
