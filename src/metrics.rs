//! Trial-level clinical metrics reduced from the tap-event sequence.

use serde::Serialize;

use crate::detect::TapEvent;
use crate::landmarks::Hand;

/// Aggregate outcome of one trial. Immutable once produced; serialized as
/// the CLI's output record. Raw distance/time sequences ride along for
/// audit and replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub success: bool,
    pub hand: Option<Hand>,
    pub tap_count: usize,
    pub frequency_hz: f64,
    pub amplitude: f64,
    pub rhythm_variability: f64,
    pub amplitude_decrement: f64,
    pub duration_ms: u64,
    pub taps: Vec<TapEvent>,
    pub distances: Vec<f64>,
    pub times_ms: Vec<u64>,
}

/// Consecutive tap-time differences in milliseconds: n-1 values for n taps.
pub fn intervals(taps: &[TapEvent]) -> Vec<f64> {
    taps.windows(2)
        .map(|pair| (pair[1].time_ms - pair[0].time_ms) as f64)
        .collect()
}

/// Peak opening amplitude between each consecutive pair of taps: the max of
/// the smoothed signal over the half-open index range `[a, b)`. A pair whose
/// range runs past the signal is skipped.
pub fn interval_amplitudes(taps: &[TapEvent], smoothed: &[f64]) -> Vec<f64> {
    let mut out = Vec::new();
    for pair in taps.windows(2) {
        let (a, b) = (pair[0].index, pair[1].index);
        if b > smoothed.len() || a >= b {
            continue;
        }
        let peak = smoothed[a..b].iter().cloned().fold(f64::MIN, f64::max);
        out.push(peak);
    }
    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev_population(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Coefficient of variation of the inter-tap intervals, in percent.
pub fn rhythm_variability(intervals: &[f64]) -> f64 {
    let m = mean(intervals);
    if m == 0.0 {
        return 0.0;
    }
    stddev_population(intervals) / m * 100.0
}

/// Percentage decline in opening amplitude from the first third of the trial
/// to the last third (by count, middle excluded). A fatigue indicator; needs
/// at least three amplitude values.
pub fn amplitude_decrement(amplitudes: &[f64]) -> f64 {
    let n = amplitudes.len();
    if n < 3 {
        return 0.0;
    }
    let third = n / 3;
    let first = mean(&amplitudes[..third]);
    let last = mean(&amplitudes[n - third..]);
    if first == 0.0 {
        return 0.0;
    }
    (first - last) / first * 100.0
}

/// Reduce the final tap-event sequence and smoothed signal to a TrialResult.
/// Empty-metric cases degrade to zero; they are valid outcomes, not errors.
pub fn aggregate(
    taps: &[TapEvent],
    smoothed: &[f64],
    distances: &[f64],
    times_ms: &[u64],
    hand: Option<Hand>,
    duration_ms: u64,
    min_required_taps: usize,
) -> TrialResult {
    let ivals = intervals(taps);
    let amps = interval_amplitudes(taps, smoothed);

    let mean_interval = mean(&ivals);
    let frequency_hz = if mean_interval > 0.0 {
        1000.0 / mean_interval
    } else {
        0.0
    };

    TrialResult {
        success: taps.len() >= min_required_taps,
        hand,
        tap_count: taps.len(),
        frequency_hz,
        amplitude: mean(&amps),
        rhythm_variability: rhythm_variability(&ivals),
        amplitude_decrement: amplitude_decrement(&amps),
        duration_ms,
        taps: taps.to_vec(),
        distances: distances.to_vec(),
        times_ms: times_ms.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap(index: usize, time_ms: u64) -> TapEvent {
        TapEvent {
            index,
            time_ms,
            amplitude: 0.0,
        }
    }

    #[test]
    fn regular_intervals_have_zero_variability() {
        let ivals = [500.0, 500.0, 500.0, 500.0];
        assert_eq!(rhythm_variability(&ivals), 0.0);
    }

    #[test]
    fn variability_is_coefficient_of_variation() {
        // mean 500, population stddev 100 -> 20%
        let ivals = [400.0, 500.0, 600.0, 400.0, 600.0];
        let m = 500.0;
        let sd = (ivals.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / 5.0).sqrt();
        let expected = sd / m * 100.0;
        assert!((rhythm_variability(&ivals) - expected).abs() < 1e-9);
    }

    #[test]
    fn decrement_first_third_versus_last_third() {
        let amps = [10.0, 10.0, 10.0, 5.0, 5.0, 5.0];
        assert!((amplitude_decrement(&amps) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn decrement_excludes_middle_third() {
        // middle value 100 must not pollute either end slice
        let amps = [10.0, 100.0, 5.0];
        assert!((amplitude_decrement(&amps) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn decrement_needs_three_values() {
        assert_eq!(amplitude_decrement(&[10.0, 5.0]), 0.0);
        assert_eq!(amplitude_decrement(&[]), 0.0);
    }

    #[test]
    fn interval_amplitude_is_peak_between_taps() {
        let smoothed = [5.0, 20.0, 45.0, 30.0, 5.0, 25.0, 40.0, 10.0];
        let taps = [tap(0, 0), tap(4, 400), tap(7, 700)];
        let amps = interval_amplitudes(&taps, &smoothed);
        assert_eq!(amps, vec![45.0, 40.0]);
    }

    #[test]
    fn interval_amplitude_skips_out_of_range_pairs() {
        let smoothed = [5.0, 20.0, 5.0];
        let taps = [tap(0, 0), tap(2, 200), tap(9, 900)];
        let amps = interval_amplitudes(&taps, &smoothed);
        assert_eq!(amps, vec![20.0]);
    }

    #[test]
    fn frequency_from_two_hz_tapping() {
        let taps: Vec<TapEvent> = (0..10).map(|i| tap(i * 15, i as u64 * 500)).collect();
        let result = aggregate(&taps, &[], &[], &[], None, 5000, 15);
        assert!((result.frequency_hz - 2.0).abs() < 1e-9);
        assert_eq!(result.tap_count, 10);
        assert!(!result.success);
    }

    #[test]
    fn empty_trial_is_well_formed_not_an_error() {
        let result = aggregate(&[], &[], &[], &[], None, 10000, 15);
        assert!(!result.success);
        assert_eq!(result.tap_count, 0);
        assert_eq!(result.frequency_hz, 0.0);
        assert_eq!(result.amplitude, 0.0);
        assert_eq!(result.rhythm_variability, 0.0);
        assert_eq!(result.amplitude_decrement, 0.0);
    }

    #[test]
    fn success_flag_tracks_required_taps() {
        let taps: Vec<TapEvent> = (0..15).map(|i| tap(i * 10, i as u64 * 400)).collect();
        let result = aggregate(&taps, &[], &[], &[], None, 6000, 15);
        assert!(result.success);
        let result = aggregate(&taps[..14], &[], &[], &[], None, 6000, 15);
        assert!(!result.success);
    }
}
