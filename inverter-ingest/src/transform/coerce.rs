use inverter_domain::domain::{
    Channel, ChannelValues, NormalizedRecord, NormalizedRecordSet, RawRecordSet, RawValue,
    SERIAL_NUMBER, TIME,
};
use time::{
    format_description::{well_known::Rfc3339, BorrowedFormatItem},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

use super::SourceError;

/// Parses timestamps, the `soc` percentage and every numeric channel.
///
/// Columns are checked one at a time: `Time` first, then `soc`, then the
/// remaining channels in declared order, so the reported failure is the first
/// bad column rather than the first bad row. Row numbers are 1-based data rows.
pub fn coerce(set: &RawRecordSet) -> Result<NormalizedRecordSet, SourceError> {
    if set.is_empty() {
        return Err(SourceError::EmptyRecordSet);
    }

    let serial_idx = column(set, SERIAL_NUMBER)?;
    let serial_number = set
        .column(serial_idx)
        .next()
        .and_then(identifier_text)
        .ok_or_else(|| SourceError::MissingIdentifier {
            column: SERIAL_NUMBER.to_string(),
        })?;

    let time_idx = column(set, TIME)?;
    let timestamps = set
        .column(time_idx)
        .enumerate()
        .map(|(row, value)| {
            parse_timestamp(value).ok_or_else(|| SourceError::InvalidTimestamp {
                column: TIME.to_string(),
                row: row + 1,
                value: value.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut values = vec![ChannelValues::default(); set.len()];
    let order = std::iter::once(Channel::Soc).chain(Channel::ALL.into_iter().filter(|c| *c != Channel::Soc));
    for channel in order {
        let idx = column(set, channel.field_name())?;
        for (row, value) in set.column(idx).enumerate() {
            let parsed = if channel == Channel::Soc {
                parse_percentage(value)
                    .map(|pct| Some(pct as f64))
                    .ok_or_else(|| SourceError::InvalidPercentage {
                        column: channel.field_name().to_string(),
                        row: row + 1,
                        value: value.to_string(),
                    })?
            } else {
                parse_numeric(value).ok_or_else(|| SourceError::NonNumericColumn {
                    column: channel.field_name().to_string(),
                    row: row + 1,
                    value: value.to_string(),
                })?
            };
            values[row].set(channel, parsed);
        }
    }

    let records = timestamps
        .into_iter()
        .zip(values)
        .map(|(ts, values)| NormalizedRecord { ts, values })
        .collect();

    Ok(NormalizedRecordSet {
        label: set.label.clone(),
        serial_number,
        records,
    })
}

fn column(set: &RawRecordSet, name: &str) -> Result<usize, SourceError> {
    set.column_index(name).ok_or_else(|| SourceError::MissingColumn {
        column: name.to_string(),
    })
}

/// Device identifier as text. Integral numbers lose their fraction so a
/// serial decoded as `1234.0` reads `1234`.
pub fn identifier_text(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(format!("{n:.0}")),
        RawValue::Number(n) if n.is_finite() => Some(n.to_string()),
        _ => None,
    }
}

/// Parses the export's timestamp cell.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS[.f]]` (month, day and hour may drop the
/// leading zero), the same with `/` date separators or a
/// `T` separator, and RFC 3339. An offset, if present, is dropped and the
/// wall-clock time kept.
pub fn parse_timestamp(value: &RawValue) -> Option<PrimitiveDateTime> {
    match value {
        RawValue::DateTime(ts) => Some(*ts),
        RawValue::Text(s) => parse_timestamp_text(s.trim()),
        RawValue::Empty | RawValue::Number(_) => None,
    }
}

const LOCAL_FORMATS: [&[BorrowedFormatItem<'static>]; 5] = [
    format_description!(
        "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second][optional [.[subsecond]]]"
    ),
    format_description!(
        "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second][optional [.[subsecond]]]"
    ),
    format_description!("[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]"),
    format_description!(
        "[year]/[month padding:none]/[day padding:none] [hour padding:none]:[minute]:[second][optional [.[subsecond]]]"
    ),
    format_description!("[year]/[month padding:none]/[day padding:none] [hour padding:none]:[minute]"),
];

fn parse_timestamp_text(text: &str) -> Option<PrimitiveDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(PrimitiveDateTime::new(ts.date(), ts.time()));
    }

    LOCAL_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(text, *format).ok())
}

/// Strips one trailing `%` and parses the rest as an integer. A numeric cell
/// is accepted when it holds a whole number.
pub fn parse_percentage(value: &RawValue) -> Option<i64> {
    match value {
        RawValue::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .strip_suffix('%')
                .unwrap_or(trimmed)
                .trim()
                .parse()
                .ok()
        }
        RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

/// `Some(None)` for a missing sample, `Some(Some(v))` for a reading and `None`
/// when the cell is not numeric.
pub fn parse_numeric(value: &RawValue) -> Option<Option<f64>> {
    match value {
        RawValue::Empty => Some(None),
        RawValue::Number(n) => Some(present(*n)),
        RawValue::Text(s) if s.trim().is_empty() => Some(None),
        RawValue::Text(s) => s.trim().parse::<f64>().ok().map(present),
        RawValue::DateTime(_) => None,
    }
}

fn present(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}
