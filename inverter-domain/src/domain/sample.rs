use time::PrimitiveDateTime;

use super::{ChannelValues, TimeBucket};

/// One export row after type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub ts: PrimitiveDateTime,
    pub values: ChannelValues,
}

/// A device's coerced rows. The serial number is read once, from the first row.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecordSet {
    pub label: String,
    pub serial_number: String,
    pub records: Vec<NormalizedRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResampledRow {
    pub bucket: TimeBucket,
    pub values: ChannelValues,
}

/// Per-bucket channel means for one device, in ascending bucket order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledTable {
    pub label: String,
    pub serial_number: String,
    pub rows: Vec<ResampledRow>,
}
