//! End-to-end classification scenarios.
//!
//! Each scenario runs a synthetic series through the full pipeline:
//! resampling, indicators, thresholds, rules, and persistence.

mod integration;
use integration::common::series::{
    config, config_30min, constant_velocity, creep_with_burst, from_increments, noisy_creep,
};

use geowatch_core::{AlertLevel, ThresholdSource};
use geowatch_detector::{DecisionSource, DetectorError, Strategy};
use geowatch_monitor::{Pipeline, Monitor, NoopAdvisor};
use geowatch_summary::segments;
use std::sync::Arc;

/// Constant 0.5 mm/hr below v_alert: every tick stays NORMAL.
#[test]
fn test_scenario_a_constant_velocity_is_normal() {
    let config = config_30min("scenario-a");
    let pipeline = Pipeline::new("scenario-a", constant_velocity(200, 0.25), &config).unwrap();

    assert_eq!(pipeline.indicators().velocity_at(10), Some(0.5));
    for i in 0..pipeline.len() {
        let decision = pipeline.classify(i).unwrap().decision;
        assert_eq!(decision.level, AlertLevel::Normal, "tick {i}");
        assert!(!decision.elevated);
    }
}

/// One fast tick while displacement is above d_alert fires combined rule 2.
#[test]
fn test_scenario_b_spike_with_displacement_is_alarma() {
    let mut config = config("scenario-b");
    config.detector.fixed.d_alert = 5.0;
    config.detector.fixed.v_alarm_with_d1 = 1.5;
    config.detector.fixed.v_alarm_with_d2 = 4.0;
    config.detector.fixed.v_alarm = 5.0;

    let mut increments: Vec<f64> = (1..300)
        .map(|i| 0.004 + 0.003 * (((i * 7) % 11) as f64 / 10.0 - 0.5))
        .collect();
    // Tick 150 moves 3.5 mm/hr
    increments[149] = 3.5 / 30.0;
    let series = from_increments(2, 5.3, &increments);
    let pipeline = Pipeline::new("scenario-b", series, &config).unwrap();

    let vel = pipeline.indicators().velocity_at(150).unwrap();
    assert!((vel - 3.5).abs() < 1e-9);
    assert!((pipeline.series().points()[150].disp_mm - 6.0).abs() < 0.1);

    let spike = pipeline.classify(150).unwrap().decision;
    assert_eq!(spike.level, AlertLevel::Alarma);
    assert_eq!(spike.source, DecisionSource::Fixed);
    assert_eq!(spike.rule, "abs(d)>5 & v>1.5");

    for i in [149, 151] {
        let around = pipeline.classify(i).unwrap().decision;
        assert_eq!(around.level, AlertLevel::Alerta, "tick {i}");
        assert_eq!(around.rule, "abs(d)>5");
    }
}

/// Zero-spread baseline: thresholds unavailable, fixed rules still apply.
#[test]
fn test_scenario_c_degenerate_baseline_uses_fixed_rules() {
    let config = config_30min("scenario-c");
    let mut increments = vec![0.25; 199];
    // Tick 150 moves 1.5 mm/hr
    increments[149] = 0.75;
    let series = from_increments(30, 0.0, &increments);
    let pipeline = Pipeline::new("scenario-c", series, &config).unwrap();

    assert_eq!(pipeline.initial_thresholds(), None);

    let quiet = pipeline.classify(100).unwrap();
    assert_eq!(quiet.decision.level, AlertLevel::Normal);
    assert_eq!(quiet.decision.threshold_source, ThresholdSource::FixedOnly);
    assert_eq!(quiet.decision.source, DecisionSource::NoRule);
    assert_eq!(quiet.decision.thresholds, None);

    let skipped: Vec<Strategy> = quiet.active.unavailable.iter().map(|u| u.strategy).collect();
    assert_eq!(skipped, vec![Strategy::Sliding, Strategy::Baseline]);
    assert!(matches!(
        quiet.active.unavailable[0].error,
        DetectorError::InsufficientData { .. }
    ));
    assert!(matches!(
        quiet.active.unavailable[1].error,
        DetectorError::DegenerateStatistics { .. }
    ));

    let fast = pipeline.classify(150).unwrap().decision;
    assert_eq!(fast.level, AlertLevel::Alerta);
    assert_eq!(fast.source, DecisionSource::Fixed);
    assert_eq!(fast.rule, "v>1");
    assert_eq!(fast.threshold_source, ThresholdSource::FixedOnly);
}

/// 11.25 mm over 12h at 0.9375 mm/hr: NORMAL instantaneously, ALERTA by persistence.
#[test]
fn test_scenario_d_accumulation_elevates_normal() {
    let config = config_30min("scenario-d");
    let pipeline = Pipeline::new("scenario-d", constant_velocity(200, 0.46875), &config).unwrap();

    let early = pipeline.classify(21).unwrap().decision;
    assert_eq!(early.level, AlertLevel::Normal);
    assert!(!early.elevated);

    let first = pipeline.classify(22).unwrap().decision;
    assert!(first.elevated);

    let late = pipeline.classify(100).unwrap();
    assert!((late.accum_mm.unwrap() - 11.25).abs() < 1e-9);
    assert_eq!(late.decision.base_level, AlertLevel::Normal);
    assert_eq!(late.decision.level, AlertLevel::Alerta);
    assert_eq!(late.decision.source, DecisionSource::Persistence);
    assert_eq!(late.decision.rule, "accum_12h>10");
    assert_eq!(late.decision.base_rule, "none");
}

/// Events in the run report are exactly the non-NORMAL same-level runs.
#[tokio::test]
async fn test_events_cover_non_normal_segments() {
    let mut config = config("events-coverage");
    config.advisory.enabled = false;
    let series = creep_with_burst(600, 300..330, 2.0);

    let monitor = Monitor::new(config, series).unwrap();
    let summary = monitor.run(Arc::new(NoopAdvisor)).await.unwrap();

    let pipeline = monitor.pipeline();
    let levels: Vec<AlertLevel> = (0..pipeline.len())
        .map(|i| pipeline.classify(i).unwrap().decision.level)
        .collect();
    let expected: Vec<_> = segments(&levels)
        .into_iter()
        .filter(|s| s.level.is_elevated())
        .collect();

    assert!(!expected.is_empty());
    assert_eq!(summary.report.events.len(), expected.len());
    for (event, seg) in summary.report.events.iter().zip(&expected) {
        assert_eq!(event.level, seg.level);
        assert_eq!(event.start_index, seg.start_index);
        assert_eq!(event.end_index, seg.end_index);
        assert_eq!(event.n_points, seg.n_points());
    }

    let covered: usize = summary.report.events.iter().map(|e| e.n_points).sum();
    let elevated = levels.iter().filter(|l| l.is_elevated()).count();
    assert_eq!(covered, elevated);
    assert_eq!(summary.report.n_ticks, 600);
}

/// Snapshots are pure functions of (series, index, config).
#[test]
fn test_snapshot_is_idempotent() {
    let config = config("snapshot-idempotent");
    let pipeline = Pipeline::new("snapshot-idempotent", noisy_creep(400, 0.0), &config).unwrap();

    for i in [0, 1, 59, 60, 399] {
        let request = pipeline.request(i);
        let a = pipeline.evaluate(&request).unwrap();
        let b = pipeline.evaluate(&request).unwrap();
        assert_eq!(a, b, "tick {i}");
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.decision, pipeline.classify(i).unwrap().decision);
        assert_eq!(a.index, i);
    }
}

/// Snapshot at the first tick: velocity undefined, nothing panics.
#[test]
fn test_first_tick_snapshot() {
    let config = config("snapshot-first");
    let pipeline = Pipeline::new("snapshot-first", noisy_creep(10, 0.0), &config).unwrap();

    let snapshot = pipeline.evaluate(&pipeline.request(0)).unwrap();
    assert_eq!(snapshot.current.vel_mm_hr, None);
    assert!(snapshot.decision.insufficient_data);
    assert_eq!(snapshot.level(), AlertLevel::Normal);

    let flat = snapshot.to_flat_map();
    assert!(!flat.is_empty());
}
