use std::collections::BTreeMap;

use inverter_domain::domain::{
    BucketWidth, Channel, ChannelValues, NormalizedRecordSet, ResampledRow, ResampledTable, TimeBucket,
};

#[derive(Debug, Default)]
struct Accumulator {
    sums: [f64; Channel::COUNT],
    counts: [u32; Channel::COUNT],
}

impl Accumulator {
    fn add(&mut self, values: &ChannelValues) {
        for (channel, value) in values.iter() {
            if let Some(v) = value {
                self.sums[channel.index()] += v;
                self.counts[channel.index()] += 1;
            }
        }
    }

    fn mean(&self) -> ChannelValues {
        let mut out = ChannelValues::default();
        for channel in Channel::ALL {
            let n = self.counts[channel.index()];
            if n > 0 {
                out.set(channel, Some(self.sums[channel.index()] / f64::from(n)));
            }
        }
        out
    }
}

/// Averages every channel over fixed-width, midnight-anchored buckets.
///
/// Missing samples are skipped by the mean. Buckets between the first and the
/// last populated bucket that received no rows are still emitted, with every
/// channel `None`, so a gap in the export shows as a gap in the report.
pub fn resample(set: &NormalizedRecordSet, width: BucketWidth) -> ResampledTable {
    let mut buckets: BTreeMap<TimeBucket, Accumulator> = BTreeMap::new();
    for record in &set.records {
        buckets
            .entry(width.bucket_of(record.ts))
            .or_default()
            .add(&record.values);
    }

    let mut rows = Vec::with_capacity(buckets.len());
    if let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) {
        let mut cursor = first;
        while cursor <= last {
            let values = buckets.get(&cursor).map(Accumulator::mean).unwrap_or_default();
            rows.push(ResampledRow {
                bucket: cursor,
                values,
            });
            cursor = width.next(cursor);
        }
    }

    ResampledTable {
        label: set.label.clone(),
        serial_number: set.serial_number.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inverter_domain::domain::NormalizedRecord;
    use time::{macros::datetime, PrimitiveDateTime};

    fn record(ts: PrimitiveDateTime, values: &[(Channel, Option<f64>)]) -> NormalizedRecord {
        let mut v = ChannelValues::default();
        for (c, x) in values {
            v.set(*c, *x);
        }
        NormalizedRecord { ts, values: v }
    }

    fn set(records: Vec<NormalizedRecord>) -> NormalizedRecordSet {
        NormalizedRecordSet {
            label: "a.csv".into(),
            serial_number: "SN-A".into(),
            records,
        }
    }

    #[test]
    fn same_bucket_rows_are_averaged() {
        let table = resample(
            &set(vec![
                record(datetime!(2024-05-01 10:03), &[(Channel::PLoad, Some(100.0)), (Channel::VBat, Some(52.0))]),
                record(datetime!(2024-05-01 10:09), &[(Channel::PLoad, Some(300.0)), (Channel::VBat, Some(54.0))]),
                record(datetime!(2024-05-01 10:14:59), &[(Channel::PLoad, Some(200.0)), (Channel::VBat, None)]),
            ]),
            BucketWidth::default(),
        );

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].bucket.start(), datetime!(2024-05-01 10:00));
        assert_eq!(table.rows[0].values[Channel::PLoad], Some(200.0));
        assert_eq!(table.rows[0].values[Channel::VBat], Some(53.0));
        assert_eq!(table.rows[0].values[Channel::Ppv1], None);
    }

    #[test]
    fn buckets_are_sorted_regardless_of_input_order() {
        let table = resample(
            &set(vec![
                record(datetime!(2024-05-01 10:31), &[(Channel::PLoad, Some(3.0))]),
                record(datetime!(2024-05-01 10:01), &[(Channel::PLoad, Some(1.0))]),
                record(datetime!(2024-05-01 10:16), &[(Channel::PLoad, Some(2.0))]),
            ]),
            BucketWidth::default(),
        );

        let loads: Vec<_> = table.rows.iter().map(|r| r.values[Channel::PLoad]).collect();
        assert_eq!(loads, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn anchoring_ignores_first_timestamp() {
        let table = resample(
            &set(vec![
                record(datetime!(2024-05-01 10:07), &[(Channel::PLoad, Some(1.0))]),
                record(datetime!(2024-05-01 10:16), &[(Channel::PLoad, Some(2.0))]),
            ]),
            BucketWidth::default(),
        );

        let labels: Vec<_> = table.rows.iter().map(|r| r.bucket.label()).collect();
        assert_eq!(labels, vec!["2024/05/01 10:00", "2024/05/01 10:15"]);
    }

    #[test]
    fn interior_gaps_are_emitted_empty() {
        let table = resample(
            &set(vec![
                record(datetime!(2024-05-01 10:00), &[(Channel::PLoad, Some(1.0))]),
                record(datetime!(2024-05-01 10:50), &[(Channel::PLoad, Some(4.0))]),
            ]),
            BucketWidth::default(),
        );

        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[1].values, ChannelValues::default());
        assert_eq!(table.rows[2].values, ChannelValues::default());
        assert_eq!(table.rows[3].bucket.start(), datetime!(2024-05-01 10:45));
    }

    #[test]
    fn short_span_yields_one_bucket() {
        let table = resample(
            &set(vec![record(datetime!(2024-05-01 23:59:59), &[(Channel::PLoad, Some(5.0))])]),
            BucketWidth::default(),
        );
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].bucket.label(), "2024/05/01 23:45");
    }
}
