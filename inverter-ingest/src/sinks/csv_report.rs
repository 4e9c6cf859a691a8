use std::path::{Path, PathBuf};

use futures::Stream;
use inverter_domain::domain::{CombinedTable, Metric, SourceResult, TotalsTable};

use super::{collect_report, device_dir, format_value, source_file_stems};
use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    report::{BatchReport, SourceOutcome},
};

/// Writes the report as CSV files under `dir`: `combined.csv`, `totals.csv`
/// and `sources.csv`, plus `devices/<serial>.csv` per device.
pub struct CsvReportSink {
    dir: PathBuf,
    program_id: String,
}

impl CsvReportSink {
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
                rows += write_source(&devices.join(format!("{stem}.csv")), result)?;
            }
        }
        rows += write_outcomes(&self.dir.join("sources.csv"), &report.outcomes)?;

        if let Ok(tables) = &report.tables {
            rows += write_combined(&self.dir.join("combined.csv"), &tables.combined)?;
            rows += write_totals(&self.dir.join("totals.csv"), &tables.totals)?;
        }

        Ok(rows)
    }
}

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>, PipelineError> {
    csv::Writer::from_path(path)
        .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", path.display())))
}

fn sink_err(path: &Path) -> impl Fn(csv::Error) -> PipelineError + '_ {
    move |e| PipelineError::Sink(format!("failed to write {}: {e}", path.display()))
}

fn finish(mut w: csv::Writer<std::fs::File>, path: &Path) -> Result<(), PipelineError> {
    w.flush()
        .map_err(|e| PipelineError::Sink(format!("failed to flush {}: {e}", path.display())))
}

fn write_source(path: &Path, result: &SourceResult) -> Result<u64, PipelineError> {
    let mut w = writer(path)?;
    let mut header = vec!["time_stamp".to_string()];
    header.extend(Metric::ALL.map(|m| m.suffix().to_string()));
    w.write_record(&header).map_err(sink_err(path))?;

    for p in &result.points {
        let mut record = vec![p.bucket.label()];
        record.extend(Metric::ALL.map(|m| format_value(p.value(m))));
        w.write_record(&record).map_err(sink_err(path))?;
    }
    finish(w, path)?;
    Ok(result.points.len() as u64)
}

fn write_combined(path: &Path, table: &CombinedTable) -> Result<u64, PipelineError> {
    let mut w = writer(path)?;
    w.write_record(table.column_names()).map_err(sink_err(path))?;

    for row in &table.rows {
        let mut record = vec![row.bucket.label()];
        record.extend(row.values.iter().map(|v| format_value(*v)));
        record.push(table.program_id.clone());
        w.write_record(&record).map_err(sink_err(path))?;
    }
    finish(w, path)?;
    Ok(table.rows.len() as u64)
}

fn write_totals(path: &Path, table: &TotalsTable) -> Result<u64, PipelineError> {
    let mut w = writer(path)?;
    w.write_record(TotalsTable::column_names()).map_err(sink_err(path))?;

    for row in &table.rows {
        let mut record = vec![row.bucket.label()];
        record.extend(Metric::ALL.map(|m| format_value(row.total(m))));
        record.push(table.program_id.clone());
        w.write_record(&record).map_err(sink_err(path))?;
    }
    finish(w, path)?;
    Ok(table.rows.len() as u64)
}

fn write_outcomes(path: &Path, outcomes: &[SourceOutcome]) -> Result<u64, PipelineError> {
    let mut w = writer(path)?;
    w.write_record(["source", "status", "serial_number", "reason", "column", "message"])
        .map_err(sink_err(path))?;

    for outcome in outcomes {
        let record = match outcome {
            SourceOutcome::Processed(r) => [
                r.label.clone(),
                "processed".to_string(),
                r.serial_number.clone(),
                String::new(),
                String::new(),
                String::new(),
            ],
            SourceOutcome::Rejected { label, error } => [
                label.clone(),
                "rejected".to_string(),
                String::new(),
                error.kind().to_string(),
                error.column().unwrap_or_default().to_string(),
                error.to_string(),
            ],
        };
        w.write_record(&record).map_err(sink_err(path))?;
    }
    finish(w, path)?;
    Ok(outcomes.len() as u64)
}

#[async_trait::async_trait]
impl Sink<SourceResult> for CsvReportSink {
    type Output = BatchReport;

    async fn run<S>(&self, input: S) -> Result<BatchReport, PipelineError>
    where
        S: Stream<Item = Result<Envelope<SourceResult>, PipelineError>> + Send + Unpin + 'static,
    {
        let report = collect_report(input, &self.program_id).await;

        match self.write_report(&report) {
            Ok(rows) => {
                metrics::counter!("inverter_report_rows_written_total").increment(rows);
                tracing::info!(dir = %self.dir.display(), rows, "csv report written");
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "csv report sink failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{Pipeline, Transform},
        sinks::testing::temp_dir,
        sources::RecordSetSource,
        transform::{testing::ExportBuilder, DeviceReportTransform},
    };
    use inverter_domain::domain::{RawRecordSet, RawValue};
    use std::sync::Arc;

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(false).from_path(path).unwrap();
        rdr.records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[tokio::test]
    async fn writes_device_combined_and_totals_tables() {
        let a = ExportBuilder::new("a.csv", "SN-A")
            .sample(
                "2024-05-01 10:02:00",
                &[("ppv1", 200.0), ("ppv2", 150.0), ("ppv3", 50.0), ("pCharge", 100.0), ("pDisCharge", 30.0)],
            )
            .build();
        let b = ExportBuilder::new("b.csv", "SN-B")
            .sample("2024-05-01 10:31:00", &[("pLoad", 2000.0)])
            .build();
        let bad = ExportBuilder::new("bad.csv", "SN-X")
            .row("2024-05-01 10:00:00", &[("soc", RawValue::Text("abc%".into()))])
            .build();

        let dir = temp_dir("csv-report");
        let pipeline: Pipeline<_, RawRecordSet, SourceResult, _> = Pipeline {
            source: RecordSetSource::new(vec![a, bad, b]),
            transforms: Vec::<Arc<dyn Transform<RawRecordSet, RawRecordSet> + Send + Sync>>::new(),
            stage: Arc::new(DeviceReportTransform::default()),
            sink: CsvReportSink::new(&dir, "PRG-9"),
        };
        let report = pipeline.run().await.unwrap();
        assert_eq!(report.processed().count(), 2);

        let device = read_rows(&dir.join("devices").join("SN-A.csv"));
        assert_eq!(device[0], vec!["time_stamp", "solar_power", "battery_power", "grid_power"]);
        assert_eq!(device[1], vec!["2024/05/01 10:00", "0.4", "-0.07", "0"]);

        let combined = read_rows(&dir.join("combined.csv"));
        assert_eq!(combined[0].len(), 8);
        assert_eq!(combined[0][1], "SN-A_solar_power");
        assert_eq!(combined[0][7], "program_id");
        // SN-B has no data in the 10:00 bucket.
        assert_eq!(combined[1][4], "");
        assert_eq!(combined[1][7], "PRG-9");
        assert_eq!(combined.len(), 3);

        let totals = read_rows(&dir.join("totals.csv"));
        assert_eq!(totals[0][1], "total_solar_power");
        assert_eq!(totals[2][0], "2024/05/01 10:30");
        assert_eq!(totals[2][3], "2");

        let sources = read_rows(&dir.join("sources.csv"));
        assert_eq!(sources[2][0], "bad.csv");
        assert_eq!(sources[2][1], "rejected");
        assert_eq!(sources[2][3], "invalid_percentage");
        assert_eq!(sources[2][4], "soc");
    }

    #[tokio::test]
    async fn device_named_like_a_report_table_keeps_its_own_file() {
        let set = ExportBuilder::new("totals.csv", "totals")
            .sample("2024-05-01 10:00:00", &[("pLoad", 1000.0)])
            .build();
        let processed = DeviceReportTransform::default()
            .apply(Envelope::new(set))
            .await
            .unwrap();

        let dir = temp_dir("csv-report-collision");
        let sink = CsvReportSink::new(&dir, "PRG-9");
        sink.run(futures::stream::iter(vec![Ok(processed)])).await.unwrap();

        let device = read_rows(&dir.join("devices").join("totals.csv"));
        assert_eq!(device[0], vec!["time_stamp", "solar_power", "battery_power", "grid_power"]);
        assert_eq!(device[1][3], "1");

        let totals = read_rows(&dir.join("totals.csv"));
        assert_eq!(totals[0][1], "total_solar_power");
        assert_eq!(totals[1][3], "1");
    }

    #[tokio::test]
    async fn no_successful_sources_writes_no_tables() {
        let mut broken = ExportBuilder::new("a.csv", "SN-A")
            .sample("2024-05-01 10:00:00", &[])
            .build();
        broken.headers[1] = "Timestamp".into();

        let dir = temp_dir("csv-report-empty");
        let sink = CsvReportSink::new(&dir, "PRG-9");
        let stream = futures::stream::iter(vec![Err(PipelineError::Rejected {
            label: broken.label.clone(),
            error: crate::transform::process_source(&broken, Default::default()).unwrap_err(),
        })]);
        let report = sink.run(stream).await.unwrap();

        assert!(report.tables.is_err());
        assert!(dir.join("sources.csv").exists());
        assert!(!dir.join("combined.csv").exists());
        assert!(!dir.join("totals.csv").exists());
        assert!(!dir.join("devices").exists());
    }
}
