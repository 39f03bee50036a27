//! Displacement time series.
//!
//! A `Series` is an ordered sequence of `(timestamp, displacement_mm)` pairs
//! with strictly increasing timestamps. Gaps are allowed in the raw input;
//! [`Series::resample`] puts the samples on a fixed cadence and fills the
//! gaps by linear interpolation.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted window or shift length (100 years).
pub const MAX_WINDOW_HOURS: f64 = 876_600.0;

/// `hours` as a duration, or `None` when it is not finite, negative, or
/// outside the representable range.
pub fn hours_to_duration(hours: f64) -> Option<Duration> {
    let ms = hours * 3_600_000.0;
    if !ms.is_finite() || ms < 0.0 || ms >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(ms as i64)
}

/// One displacement sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Sample timestamp (UTC).
    pub time: DateTime<Utc>,
    /// Cumulative line-of-sight displacement in millimetres.
    pub disp_mm: f64,
}

impl SeriesPoint {
    pub fn new(time: DateTime<Utc>, disp_mm: f64) -> Self {
        Self { time, disp_mm }
    }
}

/// Time-ordered displacement series.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Build a series from points that are already strictly increasing in time.
    pub fn new(points: Vec<SeriesPoint>) -> Result<Self> {
        if let Some(pos) = points.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(CoreError::InvalidSeries(format!(
                "timestamps must be strictly increasing (index {} at {} follows {})",
                pos + 1,
                points[pos + 1].time,
                points[pos].time
            )));
        }
        Ok(Self { points })
    }

    /// Build a series from arbitrary input: sorts by time and collapses
    /// duplicate timestamps (the last sample for a timestamp wins).
    pub fn from_unsorted(mut points: Vec<SeriesPoint>) -> Self {
        points.sort_by_key(|p| p.time);
        let mut deduped: Vec<SeriesPoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.time == point.time => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    /// Resample onto a fixed cadence starting at the first timestamp.
    ///
    /// Grid values are linearly interpolated between the neighbouring finite
    /// samples. Grid points before the first (or after the last) finite
    /// sample take that sample's value.
    pub fn resample(&self, interval: Duration) -> Result<Self> {
        if interval <= Duration::zero() {
            return Err(CoreError::InvalidConfig(format!(
                "resample interval must be positive, got {interval}"
            )));
        }

        let finite: Vec<SeriesPoint> = self
            .points
            .iter()
            .copied()
            .filter(|p| p.disp_mm.is_finite())
            .collect();
        let (first, last) = match (finite.first(), finite.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Ok(Self::default()),
        };

        let start = self.points[0].time;
        let end = self.points[self.points.len() - 1].time;

        let mut out = Vec::new();
        let mut cursor = 0usize;
        let mut t = start;
        while t <= end {
            while cursor + 1 < finite.len() && finite[cursor + 1].time <= t {
                cursor += 1;
            }
            let value = if t <= first.time {
                first.disp_mm
            } else if t >= last.time {
                last.disp_mm
            } else {
                let a = finite[cursor];
                let b = finite[cursor + 1];
                let span = (b.time - a.time).num_milliseconds() as f64;
                let offset = (t - a.time).num_milliseconds() as f64;
                a.disp_mm + (b.disp_mm - a.disp_mm) * offset / span
            };
            out.push(SeriesPoint::new(t, value));
            t += interval;
        }

        Ok(Self { points: out })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&SeriesPoint> {
        self.points.get(index)
    }

    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.time).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.disp_mm).collect()
    }

    /// Sampling interval, taken from the first two samples.
    pub fn interval(&self) -> Option<Duration> {
        match self.points.as_slice() {
            [a, b, ..] => Some(b.time - a.time),
            _ => None,
        }
    }

    /// First index whose timestamp is `>= time`.
    pub fn index_at_or_after(&self, time: DateTime<Utc>) -> usize {
        self.points.partition_point(|p| p.time < time)
    }

    /// Index of the first sample inside `[time(index) - hours, time(index)]`.
    /// Windows reaching past the representable time range start at 0.
    pub fn window_start(&self, index: usize, hours: f64) -> usize {
        let Some(end) = self.points.get(index) else {
            return index;
        };
        match hours_to_duration(hours).and_then(|w| end.time.checked_sub_signed(w)) {
            Some(start) => self.points[..=index].partition_point(|p| p.time < start),
            None => 0,
        }
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            points: Vec<SeriesPoint>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Series::new(raw.points).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let points = vec![SeriesPoint::new(t(0), 0.0), SeriesPoint::new(t(0), 1.0)];
        let err = Series::new(points).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_from_unsorted_sorts_and_dedups() {
        let series = Series::from_unsorted(vec![
            SeriesPoint::new(t(4), 2.0),
            SeriesPoint::new(t(0), 0.0),
            SeriesPoint::new(t(2), 1.0),
            SeriesPoint::new(t(2), 1.5),
        ]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.values(), vec![0.0, 1.5, 2.0]);
    }

    #[test]
    fn test_resample_fills_gap_linearly() {
        let series = Series::new(vec![
            SeriesPoint::new(t(0), 0.0),
            SeriesPoint::new(t(2), 1.0),
            SeriesPoint::new(t(8), 4.0),
        ])
        .unwrap();

        let resampled = series.resample(Duration::minutes(2)).unwrap();
        assert_eq!(resampled.len(), 5);
        let values = resampled.values();
        for (got, want) in values.iter().zip([0.0, 1.0, 2.0, 3.0, 4.0]) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
        assert_eq!(resampled.interval(), Some(Duration::minutes(2)));
    }

    #[test]
    fn test_resample_skips_nan_samples() {
        let series = Series::new(vec![
            SeriesPoint::new(t(0), 1.0),
            SeriesPoint::new(t(2), f64::NAN),
            SeriesPoint::new(t(4), 3.0),
        ])
        .unwrap();
        let resampled = series.resample(Duration::minutes(2)).unwrap();
        assert!((resampled.values()[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_resample_rejects_zero_interval() {
        let series = Series::new(vec![SeriesPoint::new(t(0), 1.0)]).unwrap();
        assert!(series.resample(Duration::zero()).is_err());
    }

    #[test]
    fn test_window_start() {
        let points = (0..10).map(|i| SeriesPoint::new(t(i * 60), i as f64)).collect();
        let series = Series::new(points).unwrap();

        // 3h window ending at hour 9 includes hours 6..=9
        assert_eq!(series.window_start(9, 3.0), 6);
        // window larger than history clamps to start
        assert_eq!(series.window_start(2, 12.0), 0);
    }

    #[test]
    fn test_window_start_huge_window_clamps() {
        let points = (0..10).map(|i| SeriesPoint::new(t(i * 60), i as f64)).collect();
        let series = Series::new(points).unwrap();

        assert_eq!(series.window_start(9, 1e15), 0);
        assert_eq!(series.window_start(9, f64::MAX), 0);
        assert_eq!(series.window_start(9, MAX_WINDOW_HOURS), 0);
    }

    #[test]
    fn test_hours_to_duration() {
        assert_eq!(hours_to_duration(1.5), Some(Duration::minutes(90)));
        assert_eq!(hours_to_duration(1e15), None);
        assert_eq!(hours_to_duration(f64::NAN), None);
        assert_eq!(hours_to_duration(-1.0), None);
        assert!(hours_to_duration(MAX_WINDOW_HOURS).is_some());
    }

    #[test]
    fn test_index_at_or_after() {
        let points = (0..5).map(|i| SeriesPoint::new(t(i), i as f64)).collect();
        let series = Series::new(points).unwrap();
        assert_eq!(series.index_at_or_after(t(3)), 3);
        assert_eq!(series.index_at_or_after(t(-1)), 0);
        assert_eq!(series.index_at_or_after(t(10)), 5);
    }

    #[test]
    fn test_deserialize_validates_order() {
        let json = r#"{"points":[
            {"time":"2025-08-01T00:02:00Z","disp_mm":1.0},
            {"time":"2025-08-01T00:00:00Z","disp_mm":0.0}
        ]}"#;
        assert!(serde_json::from_str::<Series>(json).is_err());
    }
}
