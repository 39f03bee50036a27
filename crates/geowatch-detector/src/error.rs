//! Detector error types.

use geowatch_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Insufficient data: have {have} points, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("Degenerate statistics: MAD = {mad}")]
    DegenerateStatistics { mad: f64 },
}

impl DetectorError {
    /// Recoverable errors turn into "unavailable" and trigger fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::DegenerateStatistics { .. }
        )
    }

    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::DegenerateStatistics { .. } => "degenerate_statistics",
        }
    }
}

impl From<CoreError> for DetectorError {
    fn from(err: CoreError) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}

pub type DetectorResult<T> = Result<T, DetectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_taxonomy() {
        assert!(DetectorError::InsufficientData { have: 3, need: 30 }.is_recoverable());
        assert!(DetectorError::DegenerateStatistics { mad: 0.0 }.is_recoverable());
        assert!(!DetectorError::InvalidConfiguration("x".into()).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = DetectorError::InsufficientData { have: 3, need: 30 };
        assert_eq!(err.to_string(), "Insufficient data: have 3 points, need 30");
        assert_eq!(err.reason(), "insufficient_data");
    }
}
