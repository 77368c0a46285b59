pub mod burn;
pub mod cache;
pub mod calendar;
pub mod classify;
pub mod format;
pub mod handler;
pub mod open_tasks;
pub mod status;

/// Faults in stored transaction data. A report built from such rows would
/// show wrong numbers, so the whole batch is rejected instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("row {row}: status value {value:?} is not a known task status")]
    UnknownStatus { row: usize, value: String },

    #[error("row {row}: status transaction has no new value")]
    MissingNewStatus { row: usize },

    #[error("row {row}: timestamp {timestamp} is out of range")]
    BadTimestamp { row: usize, timestamp: i64 },
}
