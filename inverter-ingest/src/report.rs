//! Batch entry point: many exports in, per-export outcomes and merged tables out.

use inverter_domain::domain::{BucketWidth, CombinedTable, RawRecordSet, SourceResult, TotalsTable};

use crate::{
    aggregate::{self, ReportError},
    transform::{self, ExportFingerprints, SourceError},
};

/// What happened to one export.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Processed(SourceResult),
    Rejected { label: String, error: SourceError },
}

impl SourceOutcome {
    pub fn label(&self) -> &str {
        match self {
            SourceOutcome::Processed(r) => &r.label,
            SourceOutcome::Rejected { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTables {
    pub combined: CombinedTable,
    pub totals: TotalsTable,
}

/// Outcomes in input order, plus the merged tables when at least one export
/// made it through.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub program_id: String,
    pub outcomes: Vec<SourceOutcome>,
    pub tables: Result<ReportTables, ReportError>,
}

impl BatchReport {
    pub fn processed(&self) -> impl Iterator<Item = &SourceResult> {
        self.outcomes.iter().filter_map(|o| match o {
            SourceOutcome::Processed(r) => Some(r),
            SourceOutcome::Rejected { .. } => None,
        })
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&str, &SourceError)> {
        self.outcomes.iter().filter_map(|o| match o {
            SourceOutcome::Rejected { label, error } => Some((label.as_str(), error)),
            SourceOutcome::Processed(_) => None,
        })
    }
}

/// Builds the report from already-processed outcomes.
pub fn assemble(outcomes: Vec<SourceOutcome>, program_id: &str) -> BatchReport {
    let tables = aggregate::aggregate(
        outcomes.iter().filter_map(|o| match o {
            SourceOutcome::Processed(r) => Some(r),
            SourceOutcome::Rejected { .. } => None,
        }),
        program_id,
    )
    .map(|(combined, totals)| ReportTables { combined, totals });

    BatchReport {
        program_id: program_id.to_string(),
        outcomes,
        tables,
    }
}

/// Processes every export independently and merges the ones that succeed.
///
/// A failing export only produces a `Rejected` outcome; the rest of the batch
/// carries on. An export identical in content to an earlier one is rejected
/// as a duplicate.
pub fn process_batch(sets: &[RawRecordSet], program_id: &str, width: BucketWidth) -> BatchReport {
    let mut fingerprints = ExportFingerprints::default();
    let outcomes = sets
        .iter()
        .map(|set| {
            let processed = match fingerprints.observe(set) {
                Some(first) => Err(SourceError::DuplicateSource { first }),
                None => transform::process_source(set, width),
            };
            match processed {
                Ok(result) => {
                    metrics::counter!("inverter_sources_processed_total").increment(1);
                    SourceOutcome::Processed(result)
                }
                Err(error) => {
                    transform::record_rejection(&set.label, &error);
                    SourceOutcome::Rejected {
                        label: set.label.clone(),
                        error,
                    }
                }
            }
        })
        .collect();

    assemble(outcomes, program_id)
}
