//! Event aggregation over a classified series.
//!
//! An event is a maximal run of consecutive ticks sharing one non-NORMAL
//! level. A level change (including ALERTA to ALARMA) closes the current
//! event; two runs separated by a single NORMAL tick stay separate.

use chrono::{DateTime, Utc};
use geowatch_core::AlertLevel;
use serde::Serialize;

/// One classified tick as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedTick {
    pub time: DateTime<Utc>,
    pub disp_mm: f64,
    pub vel_mm_hr: Option<f64>,
    pub level: AlertLevel,
}

/// A maximal run of equal levels, NORMAL included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start_index: usize,
    /// Inclusive.
    pub end_index: usize,
    pub level: AlertLevel,
}

impl Segment {
    pub fn n_points(&self) -> usize {
        self.end_index - self.start_index + 1
    }
}

/// Split `levels` into maximal same-level runs.
///
/// The segments cover every index exactly once, in order.
pub fn segments(levels: &[AlertLevel]) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    for (i, &level) in levels.iter().enumerate() {
        match out.last_mut() {
            Some(seg) if seg.level == level => seg.end_index = i,
            _ => out.push(Segment {
                start_index: i,
                end_index: i,
                level,
            }),
        }
    }
    out
}

/// A closed (or boundary-truncated) non-NORMAL episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub level: AlertLevel,
    pub start_index: usize,
    /// Inclusive.
    pub end_index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub n_points: usize,
    pub duration_hours: f64,
    /// Peak |velocity| inside the event, if any velocity was defined.
    pub vel_max_mm_hr: Option<f64>,
    pub t_vel_max: Option<DateTime<Utc>>,
    pub disp_min_mm: f64,
    pub disp_max_mm: f64,
    pub disp_range_mm: f64,
    /// Displacement at the last tick minus the first.
    pub disp_delta_mm: f64,
    /// The series began inside this event.
    pub open_at_start: bool,
    /// The series ended inside this event.
    pub open_at_end: bool,
}

#[derive(Debug, Clone)]
struct OpenEvent {
    level: AlertLevel,
    start_index: usize,
    end_index: usize,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    vel_max: Option<(f64, DateTime<Utc>)>,
    disp_first: f64,
    disp_last: f64,
    disp_min: f64,
    disp_max: f64,
}

impl OpenEvent {
    fn new(index: usize, tick: &ClassifiedTick) -> Self {
        let mut event = Self {
            level: tick.level,
            start_index: index,
            end_index: index,
            start: tick.time,
            end: tick.time,
            vel_max: None,
            disp_first: tick.disp_mm,
            disp_last: tick.disp_mm,
            disp_min: f64::INFINITY,
            disp_max: f64::NEG_INFINITY,
        };
        event.extend(index, tick);
        event
    }

    fn extend(&mut self, index: usize, tick: &ClassifiedTick) {
        self.end_index = index;
        self.end = tick.time;
        self.disp_last = tick.disp_mm;
        if tick.disp_mm.is_finite() {
            self.disp_min = self.disp_min.min(tick.disp_mm);
            self.disp_max = self.disp_max.max(tick.disp_mm);
        }
        if let Some(v) = tick.vel_mm_hr.filter(|v| v.is_finite()).map(f64::abs) {
            if self.vel_max.map_or(true, |(max, _)| v > max) {
                self.vel_max = Some((v, tick.time));
            }
        }
    }

    fn close(self, open_at_end: bool) -> Event {
        let (disp_min, disp_max) = if self.disp_min <= self.disp_max {
            (self.disp_min, self.disp_max)
        } else {
            (f64::NAN, f64::NAN)
        };
        Event {
            level: self.level,
            start_index: self.start_index,
            end_index: self.end_index,
            start: self.start,
            end: self.end,
            n_points: self.end_index - self.start_index + 1,
            duration_hours: (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0,
            vel_max_mm_hr: self.vel_max.map(|(v, _)| v),
            t_vel_max: self.vel_max.map(|(_, t)| t),
            disp_min_mm: disp_min,
            disp_max_mm: disp_max,
            disp_range_mm: disp_max - disp_min,
            disp_delta_mm: self.disp_last - self.disp_first,
            open_at_start: self.start_index == 0,
            open_at_end,
        }
    }
}

/// Single-pass event builder.
///
/// Feed ticks in index order with [`push`](Self::push); each call returns the
/// event it closed, if any. [`finish`](Self::finish) closes a trailing event.
#[derive(Debug, Default)]
pub struct EventAggregator {
    open: Option<OpenEvent>,
    next_index: usize,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group a whole classified series into events.
    pub fn aggregate(ticks: &[ClassifiedTick]) -> Vec<Event> {
        let mut aggregator = Self::new();
        let mut events: Vec<Event> = ticks
            .iter()
            .filter_map(|tick| aggregator.push(tick))
            .collect();
        events.extend(aggregator.finish());
        events
    }

    /// Consume the next tick.
    pub fn push(&mut self, tick: &ClassifiedTick) -> Option<Event> {
        let index = self.next_index;
        self.next_index += 1;

        match self.open.as_mut() {
            Some(open) if open.level == tick.level => {
                open.extend(index, tick);
                None
            }
            _ => {
                let closed = self.open.take().map(|e| e.close(false));
                if tick.level.is_elevated() {
                    self.open = Some(OpenEvent::new(index, tick));
                }
                closed
            }
        }
    }

    /// Close the trailing event, if the series ends inside one.
    pub fn finish(self) -> Option<Event> {
        self.open.map(|e| e.close(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use AlertLevel::{Alarma as M, Alerta as A, Normal as N};

    fn ticks(levels: &[AlertLevel]) -> Vec<ClassifiedTick> {
        let t0 = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        levels
            .iter()
            .enumerate()
            .map(|(i, &level)| ClassifiedTick {
                time: t0 + Duration::minutes(2 * i as i64),
                disp_mm: i as f64 * 0.5,
                vel_mm_hr: if i == 0 { None } else { Some(i as f64 * 0.1) },
                level,
            })
            .collect()
    }

    #[test]
    fn test_segments_cover_every_index_once() {
        let levels = [N, N, A, A, M, A, N, A, N, N];
        let segs = segments(&levels);

        let mut covered = Vec::new();
        for seg in &segs {
            for i in seg.start_index..=seg.end_index {
                assert_eq!(levels[i], seg.level);
                covered.push(i);
            }
        }
        assert_eq!(covered, (0..levels.len()).collect::<Vec<_>>());
        assert_eq!(segs.len(), 7);
        assert!(segments(&[]).is_empty());
    }

    #[test]
    fn test_events_are_non_normal_segments() {
        let levels = [N, A, A, M, M, A, N];
        let events = EventAggregator::aggregate(&ticks(&levels));
        let expected: Vec<Segment> = segments(&levels)
            .into_iter()
            .filter(|s| s.level.is_elevated())
            .collect();

        assert_eq!(events.len(), expected.len());
        for (event, seg) in events.iter().zip(&expected) {
            assert_eq!(event.start_index, seg.start_index);
            assert_eq!(event.end_index, seg.end_index);
            assert_eq!(event.level, seg.level);
        }
    }

    #[test]
    fn test_single_normal_gap_is_not_merged() {
        let events = EventAggregator::aggregate(&ticks(&[A, A, N, A]));
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start_index, events[0].end_index), (0, 1));
        assert_eq!((events[1].start_index, events[1].end_index), (3, 3));
    }

    #[test]
    fn test_boundary_events() {
        let events = EventAggregator::aggregate(&ticks(&[M, M, N, N, A, A]));
        assert_eq!(events.len(), 2);
        assert!(events[0].open_at_start);
        assert!(!events[0].open_at_end);
        assert!(!events[1].open_at_start);
        assert!(events[1].open_at_end);

        assert!(EventAggregator::aggregate(&[]).is_empty());
        assert!(EventAggregator::aggregate(&ticks(&[N, N])).is_empty());
    }

    #[test]
    fn test_event_metadata() {
        let events = EventAggregator::aggregate(&ticks(&[N, A, A, A, N]));
        let e = &events[0];
        assert_eq!(e.n_points, 3);
        assert!((e.duration_hours - 4.0 / 60.0).abs() < 1e-12);
        assert!((e.vel_max_mm_hr.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(e.t_vel_max, Some(e.end));
        assert!((e.disp_range_mm - 1.0).abs() < 1e-12);
        assert!((e.disp_delta_mm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_event_without_velocity() {
        let events = EventAggregator::aggregate(&ticks(&[A]));
        assert_eq!(events[0].vel_max_mm_hr, None);
        assert_eq!(events[0].disp_range_mm, 0.0);
    }

    #[test]
    fn test_incremental_push_matches_batch() {
        let levels = [N, A, M, N, A];
        let all = ticks(&levels);
        let mut agg = EventAggregator::new();
        let mut closed = Vec::new();
        for tick in &all {
            closed.extend(agg.push(tick));
        }
        assert_eq!(closed.len(), 2);
        let trailing = agg.finish();
        assert_eq!(trailing.as_ref().map(|e| e.start_index), Some(4));
        closed.extend(trailing);
        assert_eq!(closed, EventAggregator::aggregate(&all));
    }
}
