use inverter_domain::domain::{RawRecordSet, RawValue, REQUIRED_FIELDS};

use super::SourceError;

/// Checks that every required column is present and projects the export onto
/// them.
///
/// Header names are compared after trimming. The first missing column, in
/// declared order, is reported. The returned set has exactly
/// [`REQUIRED_FIELDS`] as its header, in that order, with trimmed names.
pub fn validate(set: &RawRecordSet) -> Result<RawRecordSet, SourceError> {
    let positions = REQUIRED_FIELDS
        .iter()
        .map(|name| {
            set.column_index(name).ok_or_else(|| SourceError::MissingColumn {
                column: name.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let headers = REQUIRED_FIELDS.iter().map(|name| name.to_string()).collect();
    let mut projected = RawRecordSet::new(set.label.clone(), headers);
    for row in &set.rows {
        projected.push_row(
            positions
                .iter()
                .map(|&idx| row.get(idx).cloned().unwrap_or(RawValue::Empty))
                .collect(),
        );
    }

    Ok(projected)
}
