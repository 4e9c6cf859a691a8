use futures::Stream;
use inverter_domain::domain::RawRecordSet;

use crate::pipeline::{Envelope, PipelineError, Source};

/// Record sets already decoded by the caller, e.g. rows from a spreadsheet
/// reader.
#[derive(Debug, Clone, Default)]
pub struct RecordSetSource {
    sets: Vec<RawRecordSet>,
}

impl RecordSetSource {
    pub fn new(sets: Vec<RawRecordSet>) -> Self {
        Self { sets }
    }
}

#[async_trait::async_trait]
impl Source<RawRecordSet> for RecordSetSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<RawRecordSet>, PipelineError>> + Send>> {
        let items: Vec<Result<Envelope<RawRecordSet>, PipelineError>> =
            self.sets.iter().cloned().map(|set| Ok(Envelope::new(set))).collect();
        Box::pin(futures::stream::iter(items))
    }
}
