pub mod pipeline;
pub mod config;
pub mod sources;
pub mod sinks;
pub mod transform;
pub mod aggregate;
pub mod report;
pub mod observability;
pub mod metrics_server;

pub use pipeline::{Pipeline, Envelope};
pub use report::{process_batch, BatchReport, SourceOutcome};
