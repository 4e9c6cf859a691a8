use std::fmt;

use time::PrimitiveDateTime;

static EMPTY: RawValue = RawValue::Empty;

/// A single cell as delivered by the export decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Number(f64),
    Text(String),
    /// Wall-clock timestamp already decoded by a spreadsheet reader.
    DateTime(PrimitiveDateTime),
}

impl RawValue {
    /// Blank text becomes `Empty`; anything else is kept verbatim.
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Empty => Ok(()),
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Text(s) => f.write_str(s),
            RawValue::DateTime(ts) => write!(f, "{ts}"),
        }
    }
}

/// One device export: a header of field names and rows aligned to it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecordSet {
    /// Where the rows came from (file name or caller label); used in reports.
    pub label: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawRecordSet {
    pub fn new<L: Into<String>>(label: L, headers: Vec<String>) -> Self {
        Self {
            label: label.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding short rows with `Empty` and dropping cells past
    /// the last header.
    pub fn push_row(&mut self, mut row: Vec<RawValue>) {
        row.resize(self.headers.len(), RawValue::Empty);
        self.rows.push(row);
    }

    /// Position of `name` in the header, comparing trimmed names. The first
    /// match wins when a name repeats.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&RawValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn column<'a>(&'a self, column: usize) -> impl Iterator<Item = &'a RawValue> + 'a {
        self.rows.iter().map(move |r| r.get(column).unwrap_or(&EMPTY))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_pads_and_truncates_to_header() {
        let mut set = RawRecordSet::new("a.csv", vec!["x".into(), "y".into()]);
        set.push_row(vec![RawValue::Number(1.0)]);
        set.push_row(vec![RawValue::Number(1.0), RawValue::Number(2.0), RawValue::Number(3.0)]);

        assert_eq!(set.rows[0], vec![RawValue::Number(1.0), RawValue::Empty]);
        assert_eq!(set.rows[1].len(), 2);
    }

    #[test]
    fn column_index_trims_header_names() {
        let set = RawRecordSet::new("a.csv", vec!["  Time ".into(), "pLoad".into(), "Time".into()]);
        assert_eq!(set.column_index("Time"), Some(0));
        assert_eq!(set.column_index(" pLoad"), Some(1));
        assert_eq!(set.column_index("soc"), None);
    }

    #[test]
    fn blank_text_is_empty() {
        assert_eq!(RawValue::from_text("   "), RawValue::Empty);
        assert!(RawValue::Text(" ".into()).is_empty());
        assert!(!RawValue::from_text("N/A").is_empty());
    }
}
