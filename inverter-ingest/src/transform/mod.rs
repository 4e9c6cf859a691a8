//! Per-export processing: schema check, coercion, resampling, derivation.

pub mod coerce;
pub mod dedupe;
pub mod derive;
pub mod resample;
pub mod schema;

use inverter_domain::domain::{BucketWidth, RawRecordSet, SourceResult};

use crate::pipeline::{Envelope, PipelineError, Transform};

pub use dedupe::{DeduplicateExports, ExportFingerprints};

/// Why a single export was dropped from the report.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("didn't find the column '{column}'")]
    MissingColumn { column: String },
    #[error("row {row}: '{value}' in column '{column}' is not a timestamp")]
    InvalidTimestamp { column: String, row: usize, value: String },
    #[error("row {row}: '{value}' in column '{column}' is not an integer percentage")]
    InvalidPercentage { column: String, row: usize, value: String },
    #[error("row {row}: '{value}' in column '{column}' is not numeric")]
    NonNumericColumn { column: String, row: usize, value: String },
    #[error("first row has no value in identifier column '{column}'")]
    MissingIdentifier { column: String },
    #[error("export has no data rows")]
    EmptyRecordSet,
    #[error("same content as '{first}'")]
    DuplicateSource { first: String },
}

impl SourceError {
    /// Stable reason label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::MissingColumn { .. } => "missing_column",
            SourceError::InvalidTimestamp { .. } => "invalid_timestamp",
            SourceError::InvalidPercentage { .. } => "invalid_percentage",
            SourceError::NonNumericColumn { .. } => "non_numeric_column",
            SourceError::MissingIdentifier { .. } => "missing_identifier",
            SourceError::EmptyRecordSet => "empty_record_set",
            SourceError::DuplicateSource { .. } => "duplicate_source",
        }
    }

    /// The offending column, when the failure is tied to one.
    pub fn column(&self) -> Option<&str> {
        match self {
            SourceError::MissingColumn { column }
            | SourceError::InvalidTimestamp { column, .. }
            | SourceError::InvalidPercentage { column, .. }
            | SourceError::NonNumericColumn { column, .. }
            | SourceError::MissingIdentifier { column } => Some(column.as_str()),
            SourceError::EmptyRecordSet | SourceError::DuplicateSource { .. } => None,
        }
    }
}

/// Counts and logs one dropped export. Every rejection path goes through here
/// so each export is logged once.
pub(crate) fn record_rejection(label: &str, error: &SourceError) {
    metrics::counter!("inverter_sources_rejected_total", "reason" => error.kind()).increment(1);
    tracing::warn!(source = %label, reason = error.kind(), error = %error, "export rejected");
}

/// Runs one export through every stage. Stops at the first failure.
pub fn process_source(set: &RawRecordSet, width: BucketWidth) -> Result<SourceResult, SourceError> {
    let validated = schema::validate(set)?;
    let normalized = coerce::coerce(&validated)?;
    let resampled = resample::resample(&normalized, width);
    Ok(derive::derive_metrics(&resampled))
}

/// Turns a raw export into its derived series.
#[derive(Clone, Default)]
pub struct DeviceReportTransform {
    width: BucketWidth,
}

impl DeviceReportTransform {
    pub fn new(width: BucketWidth) -> Self {
        Self { width }
    }
}

#[async_trait::async_trait]
impl Transform<RawRecordSet, SourceResult> for DeviceReportTransform {
    async fn apply(
        &self,
        input: Envelope<RawRecordSet>,
    ) -> Result<Envelope<SourceResult>, PipelineError> {
        match process_source(&input.payload, self.width) {
            Ok(result) => {
                metrics::counter!("inverter_sources_processed_total").increment(1);
                tracing::info!(
                    source = %result.label,
                    serial_number = %result.serial_number,
                    buckets = result.points.len(),
                    "export processed"
                );
                Ok(input.map(|_| result))
            }
            Err(error) => {
                record_rejection(&input.payload.label, &error);
                Err(PipelineError::Rejected {
                    label: input.payload.label,
                    error,
                })
            }
        }
    }
}
