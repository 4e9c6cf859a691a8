mod bucket;
mod fields;
mod raw;
mod report;
mod sample;

pub use bucket::{BucketWidth, BucketWidthError, TimeBucket};
pub use fields::{Channel, ChannelValues, REQUIRED_FIELDS, SERIAL_NUMBER, SOC, TIME};
pub use raw::{RawRecordSet, RawValue};
pub use report::{CombinedRow, CombinedTable, DerivedPoint, Metric, SourceResult, TotalsRow, TotalsTable};
pub use sample::{NormalizedRecord, NormalizedRecordSet, ResampledRow, ResampledTable};
