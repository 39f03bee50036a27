//! Robust statistics over `f64` samples.
//!
//! Non-finite values are dropped before any statistic is computed; an empty
//! sample yields `None` rather than a default.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Consistency constant that scales MAD to a normal standard deviation.
pub const MAD_SCALE: f64 = 1.4826;

fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Arithmetic mean of the finite values.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Population standard deviation (ddof = 0) of the finite values.
pub fn std_population(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let (sq, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + (v - m).powi(2), n + 1));
    Some((sq / n as f64).sqrt())
}

/// Median of the finite values.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Raw median absolute deviation (unscaled; multiply by [`MAD_SCALE`]).
pub fn mad(values: &[f64]) -> Option<f64> {
    let med = median(values)?;
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - med).abs())
        .collect();
    median(&deviations)
}

/// Percentile `p` (0..=100) with linear interpolation between order statistics.
///
/// Matches the "linear" definition: rank = p/100 · (n − 1).
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let sorted = finite_sorted(values);
    let n = sorted.len();
    if n == 0 || !p.is_finite() {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Finite sample with a total order, for heap storage.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample(f64);

impl Eq for Sample {}

impl PartialOrd for Sample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sample {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// `percentile(&values[..=i], p)` for every `i`, in O(n log n).
///
/// The `lo + 1` smallest finite values sit in a max-heap and the rest in a
/// min-heap, so both order statistics around the rank are heap tops.
pub fn prefix_percentiles(values: &[f64], p: f64) -> Vec<Option<f64>> {
    if !p.is_finite() {
        return vec![None; values.len()];
    }
    let q = p.clamp(0.0, 100.0) / 100.0;
    let mut lower: BinaryHeap<Sample> = BinaryHeap::new();
    let mut upper: BinaryHeap<Reverse<Sample>> = BinaryHeap::new();
    let mut out = Vec::with_capacity(values.len());

    for &v in values {
        if v.is_finite() {
            match lower.peek() {
                Some(top) if v > top.0 => upper.push(Reverse(Sample(v))),
                _ => lower.push(Sample(v)),
            }
        }
        let n = lower.len() + upper.len();
        if n == 0 {
            out.push(None);
            continue;
        }

        let rank = q * (n - 1) as f64;
        let lo = rank.floor() as usize;
        while lower.len() > lo + 1 {
            if let Some(top) = lower.pop() {
                upper.push(Reverse(top));
            }
        }
        while lower.len() < lo + 1 {
            match upper.pop() {
                Some(Reverse(min)) => lower.push(min),
                None => break,
            }
        }

        let a = lower.peek().map(|s| s.0);
        let frac = rank - lo as f64;
        out.push(a.map(|a| match upper.peek() {
            Some(Reverse(b)) if frac > 0.0 => a + (b.0 - a) * frac,
            _ => a,
        }));
    }
    out
}

/// Centred rolling median with `min_periods = 1`.
///
/// The window for index `i` spans `[i - width/2, i + width - 1 - width/2]`,
/// clipped to the slice. Non-finite inputs are ignored inside each window;
/// a window with no finite value yields NaN.
pub fn rolling_median(values: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 {
        return values.to_vec();
    }
    let before = width / 2;
    let after = width - 1 - before;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(values.len() - 1);
            median(&values[lo..=hi]).unwrap_or(f64::NAN)
        })
        .collect()
}
