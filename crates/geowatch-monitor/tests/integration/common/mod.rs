//! Shared fixtures.

#![allow(dead_code)]

pub mod advisors;
pub mod series;
