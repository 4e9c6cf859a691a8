use std::{
    collections::HashMap,
    io::Read,
    path::{Path, PathBuf},
};

use futures::Stream;
use inverter_domain::domain::{RawRecordSet, RawValue};
use serde_json::Value;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::pipeline::{Envelope, PipelineError, Source};

/// How an export file is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Header row plus one row per sample, separated by the given byte.
    Delimited(u8),
    /// One JSON object per line, field name to value.
    Ndjson,
}

impl ExportFormat {
    /// Picks the layout from the extension: `.csv` is comma separated,
    /// `.dat`/`.txt` pipe separated, `.ndjson`/`.jsonl` line-delimited JSON.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(ExportFormat::Delimited(b',')),
            "dat" | "txt" => Some(ExportFormat::Delimited(b'|')),
            "ndjson" | "jsonl" => Some(ExportFormat::Ndjson),
            _ => None,
        }
    }
}

/// Reads inverter exports from disk, one record set per file.
///
/// A file that cannot be read yields a `PipelineError::Source` item and the
/// remaining files are still read.
pub struct InverterExportFileSource {
    paths: Vec<PathBuf>,
    delimiter: Option<u8>,
}

impl InverterExportFileSource {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            delimiter: None,
        }
    }

    /// Forces a delimiter for every delimited file, whatever its extension.
    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn format_for(&self, path: &Path) -> Result<ExportFormat, PipelineError> {
        match ExportFormat::from_path(path) {
            Some(ExportFormat::Ndjson) => Ok(ExportFormat::Ndjson),
            Some(ExportFormat::Delimited(d)) => Ok(ExportFormat::Delimited(self.delimiter.unwrap_or(d))),
            None => self.delimiter.map(ExportFormat::Delimited).ok_or_else(|| {
                PipelineError::Source(format!("{}: unrecognised export extension", path.display()))
            }),
        }
    }
}

fn label_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Decodes a delimited export. Ragged rows are padded.
pub fn read_delimited<R: Read>(reader: R, label: &str, delimiter: u8) -> Result<RawRecordSet, PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::Source(format!("{label}: failed to read headers: {e}")))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut set = RawRecordSet::new(label, headers);
    for (idx, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!("inverter_export_parse_errors_total").increment(1);
                return Err(PipelineError::Source(format!(
                    "{label}: failed to read row {}: {e}",
                    idx + 1
                )));
            }
        };
        set.push_row(record.iter().map(RawValue::from_text).collect());
    }

    Ok(set)
}

fn json_to_raw(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Empty,
        Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Empty),
        Value::String(s) => RawValue::from_text(&s),
        other => RawValue::Text(other.to_string()),
    }
}

/// Decodes an NDJSON export. The header is every key seen, in first-seen
/// order; a key absent from a line is an empty cell.
pub async fn read_ndjson(path: &Path, label: &str) -> Result<RawRecordSet, PipelineError> {
    let file = File::open(path)
        .await
        .map_err(|e| PipelineError::Source(format!("{label}: failed to open export: {e}")))?;
    let mut lines = BufReader::new(file).lines();

    let mut headers: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Vec<RawValue>> = Vec::new();
    let mut line_no = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| PipelineError::Source(format!("{label}: read error: {e}")))?
    {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let object: serde_json::Map<String, Value> = serde_json::from_str(&line).map_err(|e| {
            metrics::counter!("inverter_export_parse_errors_total").increment(1);
            PipelineError::Source(format!("{label}: line {line_no}: {e}"))
        })?;

        let mut row = vec![RawValue::Empty; headers.len()];
        for (key, value) in object {
            let idx = *positions.entry(key.clone()).or_insert_with(|| {
                headers.push(key);
                headers.len() - 1
            });
            if idx >= row.len() {
                row.resize(idx + 1, RawValue::Empty);
            }
            row[idx] = json_to_raw(value);
        }
        rows.push(row);
    }

    let mut set = RawRecordSet::new(label, headers);
    for row in rows {
        set.push_row(row);
    }
    Ok(set)
}

async fn read_export(path: &Path, format: ExportFormat) -> Result<RawRecordSet, PipelineError> {
    let label = label_for(path);
    match format {
        ExportFormat::Ndjson => read_ndjson(path, &label).await,
        ExportFormat::Delimited(delimiter) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| PipelineError::Source(format!("{label}: failed to open export: {e}")))?;
            read_delimited(bytes.as_slice(), &label, delimiter)
        }
    }
}

#[async_trait::async_trait]
impl Source<RawRecordSet> for InverterExportFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<RawRecordSet>, PipelineError>> + Send>> {
        let jobs: Vec<(PathBuf, Result<ExportFormat, PipelineError>)> = self
            .paths
            .iter()
            .map(|p| (p.clone(), self.format_for(p)))
            .collect();

        let s = async_stream::stream! {
            for (path, format) in jobs {
                let result = match format {
                    Ok(format) => read_export(&path, format).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(set) => {
                        tracing::debug!(path = %path.display(), rows = set.len(), "export read");
                        yield Ok(Envelope::new(set));
                    }
                    Err(e) => yield Err(e),
                }
            }
        };

        Box::pin(s)
    }
}
