//! Distance-signal history, smoothing, and velocity derivation.

/// Append-only `(time, distance)` history for one trial.
///
/// Times are milliseconds since trial start and must be non-decreasing;
/// the buffer clamps rather than panics if the tracker clock stutters.
#[derive(Debug, Default, Clone)]
pub struct SampleBuffer {
    times_ms: Vec<u64>,
    distances: Vec<f64>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time_ms: u64, distance: f64) {
        let t = match self.times_ms.last() {
            Some(&last) if time_ms < last => last,
            _ => time_ms,
        };
        self.times_ms.push(t);
        self.distances.push(distance);
    }

    pub fn clear(&mut self) {
        self.times_ms.clear();
        self.distances.clear();
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn times_ms(&self) -> &[u64] {
        &self.times_ms
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    /// Smoothed view of the buffer. Until the buffer has grown to the window
    /// size the raw signal is returned unchanged.
    pub fn smoothed(&self, window: usize) -> Vec<f64> {
        if self.distances.len() < window {
            return self.distances.clone();
        }
        moving_average(&self.distances, window)
    }
}

/// Centered moving average with the window clipped to the signal bounds,
/// so the output length always equals the input length.
pub fn moving_average(signal: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let n = signal.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n.saturating_sub(1));
        let span = &signal[lo..=hi];
        out.push(span.iter().sum::<f64>() / span.len() as f64);
    }
    out
}

/// Finite-difference derivative of the smoothed signal, in units per second.
/// One element shorter than its input; auxiliary output for overlay and
/// replay consumers, not used to gate detection.
pub fn velocity(signal: &[f64], times_ms: &[u64]) -> Vec<f64> {
    let n = signal.len().min(times_ms.len());
    let mut out = Vec::with_capacity(n.saturating_sub(1));
    for i in 1..n {
        let dt_s = (times_ms[i].saturating_sub(times_ms[i - 1])) as f64 / 1000.0;
        if dt_s > 0.0 {
            out.push((signal[i] - signal[i - 1]) / dt_s);
        } else {
            out.push(0.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_preserves_length_for_all_windows() {
        let signal: Vec<f64> = (0..20).map(|i| (i as f64).sin()).collect();
        for w in 1..=9 {
            assert_eq!(moving_average(&signal, w).len(), signal.len(), "window {w}");
        }
    }

    #[test]
    fn moving_average_window_one_is_identity() {
        let signal = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(moving_average(&signal, 1), signal);
    }

    #[test]
    fn moving_average_shrinks_at_edges() {
        let signal = [0.0, 10.0, 20.0];
        let out = moving_average(&signal, 3);
        // edge windows cover two samples, the middle covers all three
        assert!((out[0] - 5.0).abs() < 1e-9);
        assert!((out[1] - 10.0).abs() < 1e-9);
        assert!((out[2] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn buffer_returns_raw_signal_below_window_size() {
        let mut buf = SampleBuffer::new();
        buf.push(0, 40.0);
        buf.push(33, 10.0);
        assert_eq!(buf.smoothed(3), vec![40.0, 10.0]);
        buf.push(66, 40.0);
        let sm = buf.smoothed(3);
        assert_eq!(sm.len(), 3);
        assert!((sm[1] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn buffer_clamps_backwards_timestamps() {
        let mut buf = SampleBuffer::new();
        buf.push(100, 1.0);
        buf.push(90, 2.0);
        assert_eq!(buf.times_ms(), &[100, 100]);
    }

    #[test]
    fn velocity_is_one_shorter_and_scaled_to_seconds() {
        let signal = [10.0, 20.0, 15.0];
        let times = [0u64, 100, 200];
        let v = velocity(&signal, &times);
        assert_eq!(v.len(), 2);
        assert!((v[0] - 100.0).abs() < 1e-9);
        assert!((v[1] + 50.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_handles_repeated_timestamps() {
        let v = velocity(&[1.0, 2.0], &[50, 50]);
        assert_eq!(v, vec![0.0]);
    }
}
