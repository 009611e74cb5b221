//! Dual-method tap detection over the smoothed distance signal.
//!
//! Two complementary heuristics: a closing-rate threshold catches fast
//! shallow taps, a shape-based local-minimum test catches slow low-amplitude
//! ones. Candidates from both are merged by sample index and then
//! deduplicated globally by time, which is what actually enforces the
//! minimum tap spacing across the combined set.

use std::collections::BTreeSet;

use serde::Serialize;

/// Per-frame drop in normalized distance that counts as a closing motion.
const CLOSING_RATE_THRESHOLD: f64 = -3.0;

/// A detected finger-closing motion, localized to one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TapEvent {
    pub index: usize,
    pub time_ms: u64,
    pub amplitude: f64,
}

/// Method A: rate of change. A candidate wherever the signal falls faster
/// than the closing threshold between consecutive samples.
pub fn closing_rate_candidates(signal: &[f64], times_ms: &[u64], min_peak_distance_ms: u64) -> Vec<usize> {
    let mut out = Vec::new();
    let mut last_accepted_ms: Option<u64> = None;
    for i in 1..signal.len() {
        if signal[i] - signal[i - 1] < CLOSING_RATE_THRESHOLD {
            let t = times_ms[i];
            let spaced = last_accepted_ms.is_none_or(|prev| t > prev + min_peak_distance_ms);
            if spaced {
                out.push(i);
                last_accepted_ms = Some(t);
            }
        }
    }
    out
}

/// Method B: local minimum. A candidate at every 5-sample dip that bottoms
/// out below `closed_threshold`.
pub fn local_minimum_candidates(
    signal: &[f64],
    times_ms: &[u64],
    min_peak_distance_ms: u64,
    closed_threshold: f64,
) -> Vec<usize> {
    let mut out = Vec::new();
    let mut last_accepted_ms: Option<u64> = None;
    for i in 2..signal.len().saturating_sub(2) {
        let v = signal[i];
        let is_dip = v < signal[i - 1]
            && v < signal[i - 2]
            && v <= signal[i + 1]
            && v <= signal[i + 2];
        if is_dip && v < closed_threshold {
            let t = times_ms[i];
            let spaced = last_accepted_ms.is_none_or(|prev| t > prev + min_peak_distance_ms);
            if spaced {
                out.push(i);
                last_accepted_ms = Some(t);
            }
        }
    }
    out
}

/// Run both methods and reduce their candidates to the canonical tap-event
/// sequence.
///
/// The index set dedups the two methods firing on the same sample; the time
/// walk dedups them firing on different samples within one spacing window.
/// The result is strictly time-ordered with consecutive events at least
/// `min_peak_distance_ms` apart.
pub fn detect_taps(
    signal: &[f64],
    times_ms: &[u64],
    min_peak_distance_ms: u64,
    closed_threshold: f64,
) -> Vec<TapEvent> {
    debug_assert_eq!(signal.len(), times_ms.len());

    let mut candidates: BTreeSet<usize> = BTreeSet::new();
    candidates.extend(closing_rate_candidates(signal, times_ms, min_peak_distance_ms));
    candidates.extend(local_minimum_candidates(
        signal,
        times_ms,
        min_peak_distance_ms,
        closed_threshold,
    ));

    let mut ordered: Vec<usize> = candidates.into_iter().collect();
    ordered.sort_by_key(|&i| (times_ms[i], i));

    let mut taps: Vec<TapEvent> = Vec::new();
    for i in ordered {
        let t = times_ms[i];
        let spaced = taps
            .last()
            .is_none_or(|prev| t >= prev.time_ms + min_peak_distance_ms);
        if spaced {
            taps.push(TapEvent {
                index: i,
                time_ms: t,
                amplitude: signal[i],
            });
        }
    }
    taps
}
