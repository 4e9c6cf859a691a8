use super::TimeBucket;

/// The three power series reported per device, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Solar,
    Battery,
    Grid,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Solar, Metric::Battery, Metric::Grid];

    pub const fn suffix(self) -> &'static str {
        match self {
            Metric::Solar => "solar_power",
            Metric::Battery => "battery_power",
            Metric::Grid => "grid_power",
        }
    }

    pub fn total_column(self) -> String {
        format!("total_{}", self.suffix())
    }
}

/// Derived kW values for one bucket. Battery power is negative while charging.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DerivedPoint {
    #[cfg_attr(feature = "serde", serde(rename = "time_stamp"))]
    pub bucket: TimeBucket,
    pub solar_power: Option<f64>,
    pub battery_power: Option<f64>,
    pub grid_power: Option<f64>,
}

impl DerivedPoint {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Solar => self.solar_power,
            Metric::Battery => self.battery_power,
            Metric::Grid => self.grid_power,
        }
    }
}

/// Derived series of one successfully processed export.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceResult {
    pub serial_number: String,
    pub label: String,
    pub points: Vec<DerivedPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub bucket: TimeBucket,
    /// Three values per source, in `sources` order then [`Metric::ALL`] order.
    pub values: Vec<Option<f64>>,
}

/// All devices side by side on a shared bucket index.
///
/// Serializes each row as an object keyed by [`CombinedTable::column_names`].
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedTable {
    pub program_id: String,
    pub sources: Vec<String>,
    pub rows: Vec<CombinedRow>,
}

impl CombinedTable {
    /// `<serial>_<metric>` for every source, matching `CombinedRow::values`.
    pub fn value_columns(&self) -> Vec<String> {
        self.sources
            .iter()
            .flat_map(|id| Metric::ALL.map(|m| format!("{id}_{}", m.suffix())))
            .collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec!["time_stamp".to_string()];
        names.extend(self.value_columns());
        names.push("program_id".to_string());
        names
    }

    pub fn value(&self, row: usize, source: &str, metric: Metric) -> Option<f64> {
        let source_idx = self.sources.iter().position(|s| s == source)?;
        let metric_idx = Metric::ALL.iter().position(|m| *m == metric)?;
        self.rows
            .get(row)?
            .values
            .get(source_idx * Metric::ALL.len() + metric_idx)
            .copied()
            .flatten()
    }
}

#[cfg(feature = "serde")]
mod combined_serde {
    use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};

    use super::{CombinedRow, CombinedTable};

    struct RowObject<'a> {
        columns: &'a [String],
        row: &'a CombinedRow,
        program_id: &'a str,
    }

    impl Serialize for RowObject<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.columns.len() + 2))?;
            map.serialize_entry("time_stamp", &self.row.bucket)?;
            for (name, value) in self.columns.iter().zip(&self.row.values) {
                map.serialize_entry(name, value)?;
            }
            map.serialize_entry("program_id", self.program_id)?;
            map.end()
        }
    }

    struct Rows<'a> {
        table: &'a CombinedTable,
        columns: &'a [String],
    }

    impl Serialize for Rows<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(self.table.rows.iter().map(|row| RowObject {
                columns: self.columns,
                row,
                program_id: &self.table.program_id,
            }))
        }
    }

    impl Serialize for CombinedTable {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let columns = self.value_columns();
            let mut table = serializer.serialize_struct("CombinedTable", 3)?;
            table.serialize_field("program_id", &self.program_id)?;
            table.serialize_field("sources", &self.sources)?;
            table.serialize_field("rows", &Rows { table: self, columns: &columns })?;
            table.end()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TotalsRow {
    #[cfg_attr(feature = "serde", serde(rename = "time_stamp"))]
    pub bucket: TimeBucket,
    pub total_solar_power: Option<f64>,
    pub total_battery_power: Option<f64>,
    pub total_grid_power: Option<f64>,
}

impl TotalsRow {
    pub fn total(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Solar => self.total_solar_power,
            Metric::Battery => self.total_battery_power,
            Metric::Grid => self.total_grid_power,
        }
    }
}

/// Cross-device sums per bucket.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TotalsTable {
    pub program_id: String,
    pub rows: Vec<TotalsRow>,
}

impl TotalsTable {
    pub fn column_names() -> Vec<String> {
        let mut names = vec!["time_stamp".to_string()];
        names.extend(Metric::ALL.map(Metric::total_column));
        names.push("program_id".to_string());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BucketWidth;
    use time::macros::datetime;

    #[test]
    fn combined_columns_are_namespaced_by_serial() {
        let table = CombinedTable {
            program_id: "P-7".into(),
            sources: vec!["SN1".into(), "SN2".into()],
            rows: vec![CombinedRow {
                bucket: BucketWidth::default().bucket_of(datetime!(2024-05-01 10:00)),
                values: vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0), Some(6.0)],
            }],
        };

        assert_eq!(
            table.column_names(),
            vec![
                "time_stamp",
                "SN1_solar_power",
                "SN1_battery_power",
                "SN1_grid_power",
                "SN2_solar_power",
                "SN2_battery_power",
                "SN2_grid_power",
                "program_id",
            ]
        );
        assert_eq!(table.value(0, "SN2", Metric::Battery), Some(5.0));
        assert_eq!(table.value(0, "SN2", Metric::Solar), None);
        assert_eq!(table.value(0, "SN3", Metric::Solar), None);
    }

    #[test]
    fn totals_columns() {
        assert_eq!(
            TotalsTable::column_names(),
            vec![
                "time_stamp",
                "total_solar_power",
                "total_battery_power",
                "total_grid_power",
                "program_id",
            ]
        );
    }
}
