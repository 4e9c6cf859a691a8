//! Merges per-device series into the combined and totals tables.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use inverter_domain::domain::{
    CombinedRow, CombinedTable, DerivedPoint, Metric, SourceResult, TimeBucket, TotalsRow, TotalsTable,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("no export was processed successfully; nothing to combine")]
    EmptySourceSet,
}

/// Full outer join of every source on the bucket index.
///
/// A bucket that a source did not report yields `None` in that source's
/// columns. Sources keep their input order.
pub fn combine<'a, I>(results: I, program_id: &str) -> Result<CombinedTable, ReportError>
where
    I: IntoIterator<Item = &'a SourceResult>,
{
    let results: Vec<&SourceResult> = results.into_iter().collect();
    if results.is_empty() {
        return Err(ReportError::EmptySourceSet);
    }

    let mut ids = HashSet::new();
    for r in &results {
        if !ids.insert(r.serial_number.as_str()) {
            tracing::warn!(
                serial_number = %r.serial_number,
                source = %r.label,
                "serial number appears in more than one export; both are kept"
            );
        }
    }

    let by_bucket: Vec<BTreeMap<TimeBucket, &DerivedPoint>> = results
        .iter()
        .map(|r| r.points.iter().map(|p| (p.bucket, p)).collect())
        .collect();
    let buckets: BTreeSet<TimeBucket> = by_bucket.iter().flat_map(|m| m.keys().copied()).collect();

    let rows = buckets
        .into_iter()
        .map(|bucket| CombinedRow {
            bucket,
            values: by_bucket
                .iter()
                .flat_map(|points| {
                    let point = points.get(&bucket);
                    Metric::ALL.map(|m| point.and_then(|p| p.value(m)))
                })
                .collect(),
        })
        .collect();

    Ok(CombinedTable {
        program_id: program_id.to_string(),
        sources: results.iter().map(|r| r.serial_number.clone()).collect(),
        rows,
    })
}

/// Sums, per bucket, every combined column ending in each metric's suffix.
///
/// Missing values are skipped; a bucket where all of them are missing has no
/// total. Sums are rounded to 3 decimals.
pub fn totals(combined: &CombinedTable) -> TotalsTable {
    let columns = combined.value_columns();
    let members: Vec<Vec<usize>> = Metric::ALL
        .iter()
        .map(|metric| {
            columns
                .iter()
                .enumerate()
                .filter(|(_, name)| name.ends_with(metric.suffix()))
                .map(|(idx, _)| idx)
                .collect()
        })
        .collect();

    let rows = combined
        .rows
        .iter()
        .map(|row| {
            let total = |metric_idx: usize| {
                let present = members[metric_idx].iter().filter_map(|&col| row.values[col]);
                sum_present(present).map(round3)
            };
            TotalsRow {
                bucket: row.bucket,
                total_solar_power: total(0),
                total_battery_power: total(1),
                total_grid_power: total(2),
            }
        })
        .collect();

    TotalsTable {
        program_id: combined.program_id.clone(),
        rows,
    }
}

/// Both report tables, or `EmptySourceSet` when there is nothing to merge.
pub fn aggregate<'a, I>(results: I, program_id: &str) -> Result<(CombinedTable, TotalsTable), ReportError>
where
    I: IntoIterator<Item = &'a SourceResult>,
{
    let combined = combine(results, program_id)?;
    let totals = totals(&combined);
    Ok((combined, totals))
}

fn sum_present(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Rounds to 3 decimals, ties to even on the scaled value (numpy's `around`).
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round_ties_even() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use inverter_domain::domain::BucketWidth;
    use time::macros::datetime;
    use time::PrimitiveDateTime;

    fn point(ts: PrimitiveDateTime, solar: f64, battery: f64, grid: f64) -> DerivedPoint {
        DerivedPoint {
            bucket: BucketWidth::default().bucket_of(ts),
            solar_power: Some(solar),
            battery_power: Some(battery),
            grid_power: Some(grid),
        }
    }

    fn source(serial: &str, points: Vec<DerivedPoint>) -> SourceResult {
        SourceResult {
            serial_number: serial.into(),
            label: format!("{serial}.csv"),
            points,
        }
    }

    #[test]
    fn no_sources_is_an_error() {
        assert_eq!(combine(&[], "P1"), Err(ReportError::EmptySourceSet));
        assert_eq!(aggregate(&[], "P1").unwrap_err(), ReportError::EmptySourceSet);
    }

    #[test]
    fn totals_add_like_metrics_across_sources() {
        let results = vec![
            source("A", vec![point(datetime!(2024-05-01 10:00), 1.0, -0.5, 0.25)]),
            source("B", vec![point(datetime!(2024-05-01 10:00), 1.0, 0.2, 0.75)]),
        ];

        let (combined, totals) = aggregate(&results, "P1").unwrap();
        assert_eq!(combined.sources, vec!["A", "B"]);
        assert_eq!(combined.value(0, "B", Metric::Grid), Some(0.75));

        assert_eq!(totals.program_id, "P1");
        assert_eq!(totals.rows.len(), 1);
        assert_eq!(totals.rows[0].total_solar_power, Some(2.0));
        assert_eq!(totals.rows[0].total_battery_power, Some(-0.3));
        assert_eq!(totals.rows[0].total_grid_power, Some(1.0));
    }

    #[test]
    fn disjoint_buckets_leave_gaps_not_errors() {
        let results = vec![
            source("A", vec![point(datetime!(2024-05-01 10:00), 1.0, 0.0, 1.0)]),
            source("B", vec![point(datetime!(2024-05-01 10:30), 2.0, 0.0, 2.0)]),
        ];

        let (combined, totals) = aggregate(&results, "P1").unwrap();
        assert_eq!(combined.rows.len(), 2);
        assert_eq!(combined.value(0, "A", Metric::Solar), Some(1.0));
        assert_eq!(combined.value(0, "B", Metric::Solar), None);
        assert_eq!(combined.value(1, "A", Metric::Solar), None);
        assert_eq!(combined.value(1, "B", Metric::Solar), Some(2.0));

        assert_eq!(totals.rows[0].total_solar_power, Some(1.0));
        assert_eq!(totals.rows[1].total_solar_power, Some(2.0));
    }

    #[test]
    fn all_missing_bucket_has_no_total() {
        let mut gap = point(datetime!(2024-05-01 10:15), 0.0, 0.0, 0.0);
        gap.solar_power = None;
        let results = vec![source("A", vec![gap])];

        let (_, totals) = aggregate(&results, "P1").unwrap();
        assert_eq!(totals.rows[0].total_solar_power, None);
        assert_eq!(totals.rows[0].total_grid_power, Some(0.0));
    }

    #[test]
    fn totals_are_rounded_to_three_decimals() {
        let results = vec![
            source("A", vec![point(datetime!(2024-05-01 10:00), 0.1234, 0.0, 0.0)]),
            source("B", vec![point(datetime!(2024-05-01 10:00), 0.0004, 0.0, 0.0)]),
        ];
        let (_, totals) = aggregate(&results, "P1").unwrap();
        assert_eq!(totals.rows[0].total_solar_power, Some(0.124));
    }

    #[test]
    fn halfway_totals_round_to_even() {
        assert_eq!(round3(0.0625), 0.062);
        assert_eq!(round3(0.1875), 0.188);
        assert_eq!(round3(-0.0625), -0.062);
        assert_eq!(round3(1.2344), 1.234);
    }

    #[test]
    fn duplicate_serials_both_count() {
        let results = vec![
            source("A", vec![point(datetime!(2024-05-01 10:00), 1.0, 0.0, 0.0)]),
            source("A", vec![point(datetime!(2024-05-01 10:00), 0.5, 0.0, 0.0)]),
        ];
        let (combined, totals) = aggregate(&results, "P1").unwrap();
        assert_eq!(combined.value_columns().len(), 6);
        assert_eq!(totals.rows[0].total_solar_power, Some(1.5));
    }
}
