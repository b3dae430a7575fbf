//! Error types for the shared vocabulary.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised while parsing shared vocabulary values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid ts_type: {0}")]
    InvalidTsType(String),

    #[error("Invalid vertical code: {0}")]
    InvalidVerticalCode(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid time window: start {start} is after stop {stop}")]
    InvalidWindow { start: String, stop: String },
}
