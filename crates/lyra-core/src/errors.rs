use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Period {period} is out of order: starts at {start} before previous end {previous_end}")]
    PeriodOverlap {
        period: String,
        start: f64,
        previous_end: f64,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;
