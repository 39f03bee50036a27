//! Series input files.
//!
//! The loading collaborator hands over JSON: either a bare array of
//! `{"time": ..., "disp_mm": ...}` points or an object with a `points` array.
//! Points may arrive unsorted and with duplicate timestamps.

use crate::error::{AppError, AppResult};
use geowatch_core::{Series, SeriesPoint};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum SeriesFile {
    Points(Vec<SeriesPoint>),
    Wrapped { points: Vec<SeriesPoint> },
}

/// Parse a series from JSON text.
pub fn parse_series(json: &str) -> AppResult<Series> {
    let points = match serde_json::from_str::<SeriesFile>(json)? {
        SeriesFile::Points(points) | SeriesFile::Wrapped { points } => points,
    };
    if points.is_empty() {
        return Err(AppError::Input("series has no points".to_string()));
    }
    Ok(Series::from_unsorted(points))
}

/// Read a series file.
pub fn read_series(path: impl AsRef<Path>) -> AppResult<Series> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Input(format!("Failed to read {}: {e}", path.display())))?;
    parse_series(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_bare_array_unsorted() {
        let series = parse_series(
            r#"[
                {"time": "2025-08-01T00:04:00Z", "disp_mm": 0.2},
                {"time": "2025-08-01T00:00:00Z", "disp_mm": 0.0},
                {"time": "2025-08-01T00:02:00Z", "disp_mm": 0.1}
            ]"#,
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.values(), vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn test_parse_wrapped() {
        let series =
            parse_series(r#"{"points": [{"time": "2025-08-01T00:00:00Z", "disp_mm": 1.5}]}"#)
                .unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(matches!(parse_series("[]"), Err(AppError::Input(_))));
        assert!(matches!(parse_series("{\"x\": 1}"), Err(AppError::Json(_))));
    }

    #[test]
    fn test_read_series_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"time": "2025-08-01T00:00:00Z", "disp_mm": 0.5}}]"#).unwrap();
        let series = read_series(file.path()).unwrap();
        assert_eq!(series.values(), vec![0.5]);

        assert!(read_series("/nonexistent/series.json").is_err());
    }
}
