use futures::Stream;
use inverter_domain::domain::SourceResult;

use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    report::BatchReport,
};

/// Keeps the report in memory for the caller to render.
pub struct MemoryReportSink {
    program_id: String,
}

impl MemoryReportSink {
    pub fn new<P: Into<String>>(program_id: P) -> Self {
        Self {
            program_id: program_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl Sink<SourceResult> for MemoryReportSink {
    type Output = BatchReport;

    async fn run<S>(&self, input: S) -> Result<BatchReport, PipelineError>
    where
        S: Stream<Item = Result<Envelope<SourceResult>, PipelineError>> + Send + Unpin + 'static,
    {
        Ok(super::collect_report(input, &self.program_id).await)
    }
}
