//! Integration tests for geowatch-monitor.
//!
//! These tests drive the full pipeline on synthetic series:
//! - reference classification scenarios
//! - event coverage and snapshot purity
//! - the async runner with misbehaving advisors

pub mod common;
