//! Summary error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Index {index} out of range for series of {len} points")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tick at {time} is not after the last logged tick at {last}")]
    OutOfOrder {
        time: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SummaryResult<T> = Result<T, SummaryError>;
