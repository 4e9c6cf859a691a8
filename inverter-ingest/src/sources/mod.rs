pub mod export_file;
pub mod record_sets;

pub use export_file::{ExportFormat, InverterExportFileSource};
pub use record_sets::RecordSetSource;
