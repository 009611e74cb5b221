//! Frame-stream ingestion and the trial loop.
//!
//! The tracking collaborator delivers one JSON frame record per line; this
//! module pulls them off a reader, drives the controller in arrival order,
//! and forwards engine events to the log until a result is produced.

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::landmarks::FrameRecord;
use crate::metrics::TrialResult;
use crate::trial::{EngineEvent, TrialController, TrialState};

pub fn open_source(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(p) => {
            let f = File::open(p).with_context(|| format!("failed to open {}", p.display()))?;
            Ok(Box::new(BufReader::new(f)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Run one trial over the frame stream. The trial starts at the first
/// record's timestamp and ends at the auto-stop deadline, on `stop_flag`
/// (SIGINT/SIGTERM in the CLI), or when the stream runs out.
pub fn run_trial(
    reader: Box<dyn BufRead>,
    controller: &mut TrialController,
    stop_flag: &AtomicBool,
) -> Result<TrialResult> {
    let mut tap_count = 0usize;
    let mut last_t_ms = 0u64;
    let mut outcome: Option<TrialResult> = None;

    debug!(
        "trial settings: duration {}ms, min tap spacing {}ms",
        controller.settings().trial_duration_ms,
        controller.settings().min_peak_distance_ms
    );

    'frames: for line in reader.lines() {
        let line = line.context("failed to read frame stream")?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: FrameRecord = match serde_json::from_str(&line) {
            Ok(rec) => rec,
            Err(e) => {
                handle_event(
                    EngineEvent::Error(format!("skipping malformed frame record: {e}")),
                    &mut tap_count,
                );
                continue;
            }
        };

        if controller.state() != TrialState::Recording && controller.last_result().is_none() {
            for event in controller
                .start(rec.t_ms)
                .map_err(|e| anyhow!("cannot start trial: {e}"))?
            {
                if let Some(result) = handle_event(event, &mut tap_count) {
                    outcome = Some(result);
                    break 'frames;
                }
            }
        }
        last_t_ms = rec.t_ms;

        if stop_flag.load(Ordering::Relaxed) {
            info!("interrupt received, stopping trial");
            break;
        }

        for event in controller.process_frame(&rec) {
            if let Some(result) = handle_event(event, &mut tap_count) {
                outcome = Some(result);
                break 'frames;
            }
        }
    }

    // stream exhausted or interrupted while still recording
    if outcome.is_none() && controller.state() == TrialState::Recording {
        for event in controller.stop(last_t_ms)? {
            if let Some(result) = handle_event(event, &mut tap_count) {
                outcome = Some(result);
            }
        }
    }

    let result = outcome.ok_or_else(|| anyhow!("frame stream ended before a trial could run"))?;
    let peak_closing = controller
        .velocity_trace()
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min);
    if peak_closing.is_finite() {
        debug!("peak closing velocity {peak_closing:.1} units/s");
    }
    Ok(result)
}

fn handle_event(event: EngineEvent, tap_count: &mut usize) -> Option<TrialResult> {
    match event {
        EngineEvent::TrialStarted => info!("trial started"),
        EngineEvent::Tap(tap) => {
            *tap_count += 1;
            info!(
                "tap {} at {}ms (amplitude {:.1})",
                tap_count, tap.time_ms, tap.amplitude
            );
        }
        EngineEvent::HandFound => info!("hand found"),
        EngineEvent::HandLost => warn!("hand lost"),
        EngineEvent::Error(msg) => error!("engine error: {msg}"),
        EngineEvent::TrialCompleted(result) => {
            info!(
                "trial complete: {} taps, {:.2} Hz, variability {:.1}%",
                result.tap_count, result.frequency_hz, result.rhythm_variability
            );
            return Some(result);
        }
    }
    None
}
