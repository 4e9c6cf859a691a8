use std::fmt;

use time::{format_description::BorrowedFormatItem, macros::format_description, Duration, PrimitiveDateTime};

const MINUTES_PER_DAY: u32 = 24 * 60;

const LABEL_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]/[month]/[day] [hour]:[minute]");

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketWidthError {
    #[error("bucket width must be at least one minute")]
    Zero,
    #[error("bucket width of {0} minutes does not divide a day evenly")]
    UnevenDay(u32),
}

/// Width of a resampling window.
///
/// Windows are anchored at midnight. Because the width must divide a day,
/// the boundaries are the same as those counted from the Unix epoch, so
/// two devices always land on the same grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketWidth {
    minutes: u32,
}

impl BucketWidth {
    pub const DEFAULT_MINUTES: u32 = 15;

    pub fn from_minutes(minutes: u32) -> Result<Self, BucketWidthError> {
        if minutes == 0 {
            return Err(BucketWidthError::Zero);
        }
        if MINUTES_PER_DAY % minutes != 0 {
            return Err(BucketWidthError::UnevenDay(minutes));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(self) -> u32 {
        self.minutes
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }

    /// Bucket containing `ts`: `ts` truncated down to the nearest boundary.
    pub fn bucket_of(self, ts: PrimitiveDateTime) -> TimeBucket {
        let (hour, minute, _) = ts.time().as_hms();
        let minute_of_day = u32::from(hour) * 60 + u32::from(minute);
        let start = minute_of_day / self.minutes * self.minutes;
        TimeBucket(ts.date().midnight() + Duration::minutes(i64::from(start)))
    }

    pub fn next(self, bucket: TimeBucket) -> TimeBucket {
        TimeBucket(bucket.0 + self.duration())
    }
}

impl Default for BucketWidth {
    fn default() -> Self {
        Self {
            minutes: Self::DEFAULT_MINUTES,
        }
    }
}

/// Start of a resampling window; the row key of every report table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket(PrimitiveDateTime);

impl TimeBucket {
    pub fn start(self) -> PrimitiveDateTime {
        self.0
    }

    /// `YYYY/MM/DD HH:MM`, the format report consumers key rows by.
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.0.format(LABEL_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&label)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TimeBucket {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
