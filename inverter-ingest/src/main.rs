use anyhow::{bail, Result};
use inverter_domain::domain::{RawRecordSet, SourceResult};
use inverter_ingest::{
    config::{AppConfig, OutputFormat},
    metrics_server,
    observability,
    pipeline::{Envelope, Pipeline, PipelineError, Sink, Transform},
    report::BatchReport,
    sinks::{CsvReportSink, JsonReportSink},
    sources::InverterExportFileSource,
    transform::{DeduplicateExports, DeviceReportTransform},
};
use std::sync::Arc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

enum ReportOutput {
    Csv(CsvReportSink),
    Json(JsonReportSink),
}

#[async_trait::async_trait]
impl Sink<SourceResult> for ReportOutput {
    type Output = BatchReport;

    async fn run<S>(&self, input: S) -> Result<BatchReport, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<SourceResult>, PipelineError>> + Send + Unpin + 'static,
    {
        match self {
            Self::Csv(s) => s.run(input).await,
            Self::Json(s) => s.run(input).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut args = std::env::args().skip(1);
    let (program_id, files) = match args.next() {
        Some(id) if !id.trim().is_empty() => (id, args.collect::<Vec<_>>()),
        _ => bail!("usage: inverter-ingest <program_id> <export-file>..."),
    };
    if files.is_empty() {
        bail!("usage: inverter-ingest <program_id> <export-file>...");
    }

    let cfg = AppConfig::load()?;
    let width = cfg.resample.bucket_width()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    tracing::info!(
        version = VERSION,
        program_id = %program_id,
        files = files.len(),
        bucket_minutes = width.minutes(),
        "starting inverter report"
    );

    let sink = match cfg.output.format {
        OutputFormat::Csv => ReportOutput::Csv(CsvReportSink::new(&cfg.output.dir, &program_id)),
        OutputFormat::Json => ReportOutput::Json(JsonReportSink::new(&cfg.output.dir, &program_id)),
    };
    let dedupe: Arc<dyn Transform<RawRecordSet, RawRecordSet> + Send + Sync> =
        Arc::new(DeduplicateExports::default());

    let pipeline: Pipeline<_, RawRecordSet, SourceResult, _> = Pipeline {
        source: InverterExportFileSource::new(files).with_delimiter(cfg.source.delimiter_byte()?),
        transforms: vec![dedupe],
        stage: Arc::new(DeviceReportTransform::new(width)),
        sink,
    };

    let report = pipeline.run().await?;

    let outcome = match &report.tables {
        Ok(tables) => {
            tracing::info!(
                processed = report.processed().count(),
                rejected = report.rejected().count(),
                buckets = tables.totals.rows.len(),
                dir = %cfg.output.dir.display(),
                "report complete"
            );
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("no report produced for {program_id}: {e}")),
    };

    if let Some(linger) = cfg.metrics.as_ref().and_then(|m| m.linger()) {
        tracing::info!(seconds = linger.as_secs(), "serving metrics before exit");
        tokio::time::sleep(linger).await;
    }

    outcome
}
