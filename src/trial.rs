//! Trial lifecycle state machine and per-frame processing pipeline.
//!
//! The controller exclusively owns the signal buffer and trial state; the
//! normalizer, smoother, detector, and aggregator are pure functions it runs
//! over that data in frame order. Every mutating call returns the events it
//! emitted, so the boundary layer decides what to do with them.

use log::debug;
use thiserror::Error;

use crate::config::TrialSettings;
use crate::detect::{self, TapEvent};
use crate::landmarks::{FrameRecord, Hand};
use crate::metrics::{self, TrialResult};
use crate::signal::{self, SampleBuffer};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("a trial is already recording")]
    TrialInProgress,
    #[error("no trial in progress")]
    NoActiveTrial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    Recording,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TrialStarted,
    Tap(TapEvent),
    TrialCompleted(TrialResult),
    HandFound,
    HandLost,
    Error(String),
}

/// Orchestrates one trial at a time over the incoming frame stream.
#[derive(Debug)]
pub struct TrialController {
    settings: TrialSettings,
    state: TrialState,
    buffer: SampleBuffer,
    smoothed: Vec<f64>,
    velocities: Vec<f64>,
    taps: Vec<TapEvent>,
    start_ms: u64,
    hand: Option<Hand>,
    hand_visible: bool,
    last_result: Option<TrialResult>,
}

impl TrialController {
    pub fn new(settings: TrialSettings) -> Self {
        Self {
            settings,
            state: TrialState::Idle,
            buffer: SampleBuffer::new(),
            smoothed: Vec::new(),
            velocities: Vec::new(),
            taps: Vec::new(),
            start_ms: 0,
            hand: None,
            hand_visible: false,
            last_result: None,
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn settings(&self) -> &TrialSettings {
        &self.settings
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    /// Closing/opening speed trace aligned with the smoothed signal;
    /// diagnostic output for overlay consumers.
    pub fn velocity_trace(&self) -> &[f64] {
        &self.velocities
    }

    pub fn taps(&self) -> &[TapEvent] {
        &self.taps
    }

    pub fn last_result(&self) -> Option<&TrialResult> {
        self.last_result.as_ref()
    }

    /// Begin a trial at `now_ms` on the tracker's clock. Fails while one is
    /// already recording, leaving the running trial untouched.
    pub fn start(&mut self, now_ms: u64) -> Result<Vec<EngineEvent>, EngineError> {
        if self.state == TrialState::Recording {
            return Err(EngineError::TrialInProgress);
        }
        self.buffer.clear();
        self.smoothed.clear();
        self.velocities.clear();
        self.taps.clear();
        self.hand = None;
        self.start_ms = now_ms;
        self.state = TrialState::Recording;
        debug!("trial started at t={now_ms}ms");
        Ok(vec![EngineEvent::TrialStarted])
    }

    /// Feed one frame record through the pipeline. Outside `Recording` only
    /// hand-visibility transitions are reported; the frame is otherwise
    /// ignored.
    pub fn process_frame(&mut self, rec: &FrameRecord) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        let frame = rec.frame();
        match (self.hand_visible, frame.is_some()) {
            (false, true) => {
                self.hand_visible = true;
                events.push(EngineEvent::HandFound);
            }
            (true, false) => {
                self.hand_visible = false;
                events.push(EngineEvent::HandLost);
            }
            _ => {}
        }

        if self.state != TrialState::Recording {
            return events;
        }

        let rel_ms = rec.t_ms.saturating_sub(self.start_ms);
        if rel_ms >= self.settings.trial_duration_ms {
            events.extend(self.finish(self.settings.trial_duration_ms));
            return events;
        }

        let Some(frame) = frame else {
            return events;
        };
        if self.hand.is_none() {
            self.hand = rec.hand;
        }

        // degenerate geometry: tracking noise, skip the frame
        let Some(distance) = frame.normalized_distance() else {
            debug!("skipping frame at t={rel_ms}ms: degenerate hand size");
            return events;
        };

        self.buffer.push(rel_ms, distance);
        self.smoothed = self.buffer.smoothed(self.settings.smoothing_window);
        self.velocities = signal::velocity(&self.smoothed, self.buffer.times_ms());

        let taps = detect::detect_taps(
            &self.smoothed,
            self.buffer.times_ms(),
            self.settings.min_peak_distance_ms,
            self.settings.closed_threshold,
        );
        for tap in taps.iter().skip(self.taps.len()) {
            events.push(EngineEvent::Tap(*tap));
        }
        self.taps = taps;

        events
    }

    /// Deadline check for quiet stretches with no incoming frames.
    pub fn tick(&mut self, now_ms: u64) -> Vec<EngineEvent> {
        if self.state == TrialState::Recording
            && now_ms.saturating_sub(self.start_ms) >= self.settings.trial_duration_ms
        {
            return self.finish(self.settings.trial_duration_ms);
        }
        Vec::new()
    }

    /// End the trial at `now_ms`. Only the transition out of `Recording`
    /// computes a result; a second call is rejected.
    pub fn stop(&mut self, now_ms: u64) -> Result<Vec<EngineEvent>, EngineError> {
        if self.state != TrialState::Recording {
            return Err(EngineError::NoActiveTrial);
        }
        let duration = now_ms
            .saturating_sub(self.start_ms)
            .min(self.settings.trial_duration_ms);
        Ok(self.finish(duration))
    }

    fn finish(&mut self, duration_ms: u64) -> Vec<EngineEvent> {
        self.state = TrialState::Completed;
        let result = metrics::aggregate(
            &self.taps,
            &self.smoothed,
            self.buffer.distances(),
            self.buffer.times_ms(),
            self.hand,
            duration_ms,
            self.settings.min_required_taps,
        );
        debug!(
            "trial completed: {} taps, {:.2} Hz over {duration_ms}ms",
            result.tap_count, result.frequency_hz
        );
        self.last_result = Some(result.clone());
        vec![EngineEvent::TrialCompleted(result)]
    }
}
