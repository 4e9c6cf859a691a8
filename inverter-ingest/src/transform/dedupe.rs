use std::{collections::HashMap, sync::Mutex};

use inverter_domain::domain::{RawRecordSet, RawValue};

use super::{record_rejection, SourceError};
use crate::pipeline::{Envelope, PipelineError, Transform};

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_value(hasher: &mut blake3::Hasher, value: &RawValue) {
    match value {
        RawValue::Empty => {
            hasher.update(&[0]);
        }
        RawValue::Number(n) => {
            hasher.update(&[1]);
            hasher.update(&n.to_bits().to_le_bytes());
        }
        RawValue::Text(s) => {
            hasher.update(&[2]);
            hash_str(hasher, s);
        }
        RawValue::DateTime(ts) => {
            hasher.update(&[3]);
            hasher.update(&ts.assume_utc().unix_timestamp_nanos().to_le_bytes());
        }
    }
}

/// Content digest of an export: trimmed header names plus every cell.
/// The label is left out so a re-uploaded file under a new name still matches.
pub fn fingerprint(set: &RawRecordSet) -> blake3::Hash {
    let mut h = blake3::Hasher::new();
    h.update(&(set.headers.len() as u32).to_le_bytes());
    for header in &set.headers {
        hash_str(&mut h, header.trim());
    }
    for row in &set.rows {
        h.update(&(row.len() as u32).to_le_bytes());
        for value in row {
            hash_value(&mut h, value);
        }
    }
    h.finalize()
}

/// Remembers which export contents were already seen in a batch.
#[derive(Debug, Default)]
pub struct ExportFingerprints {
    seen: HashMap<blake3::Hash, String>,
}

impl ExportFingerprints {
    /// Records `set`. Returns the label of the earlier identical export, if any.
    pub fn observe(&mut self, set: &RawRecordSet) -> Option<String> {
        let digest = fingerprint(set);
        if let Some(first) = self.seen.get(&digest) {
            return Some(first.clone());
        }
        self.seen.insert(digest, set.label.clone());
        None
    }
}

/// Drops exports whose content already went through this pipeline, so the
/// same file uploaded twice cannot double the totals.
#[derive(Debug, Default)]
pub struct DeduplicateExports {
    fingerprints: Mutex<ExportFingerprints>,
}

#[async_trait::async_trait]
impl Transform<RawRecordSet, RawRecordSet> for DeduplicateExports {
    async fn apply(
        &self,
        input: Envelope<RawRecordSet>,
    ) -> Result<Envelope<RawRecordSet>, PipelineError> {
        let duplicate_of = self
            .fingerprints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .observe(&input.payload);

        match duplicate_of {
            None => Ok(input),
            Some(first) => {
                let error = SourceError::DuplicateSource { first };
                record_rejection(&input.payload.label, &error);
                Err(PipelineError::Rejected {
                    label: input.payload.label,
                    error,
                })
            }
        }
    }
}
