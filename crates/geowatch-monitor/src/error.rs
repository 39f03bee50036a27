//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Core error: {0}")]
    Core(#[from] geowatch_core::CoreError),

    #[error("Detector error: {0}")]
    Detector(#[from] geowatch_detector::DetectorError),

    #[error("Summary error: {0}")]
    Summary(#[from] geowatch_summary::SummaryError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] geowatch_telemetry::TelemetryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures reported by an advisor. Never affects classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdvisoryError {
    #[error("Advisory call failed: {0}")]
    Failed(String),

    #[error("Invalid advisory response: {0}")]
    InvalidResponse(String),
}
