//! Hand-landmark frame records and distance normalization.

use serde::{Deserialize, Serialize};

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const LANDMARK_COUNT: usize = 21;

/// Depth is monocular and noisy; weigh it at half the planar scale.
const Z_SCALE: f64 = 0.5;

const MIN_HAND_SIZE_PX: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// One line of the tracker's newline-delimited JSON stream.
///
/// `landmarks` is absent (or too short) when no hand was detected in the
/// frame; such frames carry timing only.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    pub t_ms: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub hand: Option<Hand>,
    #[serde(default)]
    pub landmarks: Option<Vec<[f64; 3]>>,
}

impl FrameRecord {
    /// Snapshot the tracked hand, if the record contains a full set of
    /// landmarks.
    pub fn frame(&self) -> Option<LandmarkFrame> {
        let lm = self.landmarks.as_deref()?;
        if lm.len() < LANDMARK_COUNT {
            return None;
        }
        let mut points = [[0.0; 3]; LANDMARK_COUNT];
        points.copy_from_slice(&lm[..LANDMARK_COUNT]);
        Some(LandmarkFrame {
            points,
            width: self.width as f64,
            height: self.height as f64,
        })
    }
}

/// Immutable snapshot of one tracked frame: 21 normalized-image-coordinate
/// points plus the source image dimensions needed to de-normalize them.
#[derive(Debug, Clone)]
pub struct LandmarkFrame {
    points: [[f64; 3]; LANDMARK_COUNT],
    width: f64,
    height: f64,
}

impl LandmarkFrame {
    pub fn new(points: [[f64; 3]; LANDMARK_COUNT], width: f64, height: f64) -> Self {
        Self {
            points,
            width,
            height,
        }
    }

    pub fn point(&self, index: usize) -> [f64; 3] {
        self.points[index]
    }

    /// Thumb-tip to index-tip separation as a percentage of hand size.
    ///
    /// Hand size is the planar wrist-to-middle-knuckle distance in pixels,
    /// which makes the output invariant to how far the hand sits from the
    /// camera. Returns `None` on degenerate geometry (hand size ~ 0), which
    /// happens momentarily when tracking glitches; callers skip the frame.
    pub fn normalized_distance(&self) -> Option<f64> {
        let wrist = self.points[WRIST];
        let knuckle = self.points[MIDDLE_MCP];
        let dx = (knuckle[0] - wrist[0]) * self.width;
        let dy = (knuckle[1] - wrist[1]) * self.height;
        let hand_size = (dx * dx + dy * dy).sqrt();
        if hand_size < MIN_HAND_SIZE_PX {
            return None;
        }

        let thumb = self.points[THUMB_TIP];
        let index = self.points[INDEX_TIP];
        let fx = (index[0] - thumb[0]) * self.width;
        let fy = (index[1] - thumb[1]) * self.height;
        let fz = (index[2] - thumb[2]) * self.width * Z_SCALE;
        let finger_distance = (fx * fx + fy * fy + fz * fz).sqrt();

        Some(finger_distance / hand_size * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(
        wrist: [f64; 3],
        thumb: [f64; 3],
        index: [f64; 3],
        knuckle: [f64; 3],
        width: f64,
        height: f64,
    ) -> LandmarkFrame {
        let mut points = [[0.0; 3]; LANDMARK_COUNT];
        points[WRIST] = wrist;
        points[THUMB_TIP] = thumb;
        points[INDEX_TIP] = index;
        points[MIDDLE_MCP] = knuckle;
        LandmarkFrame::new(points, width, height)
    }

    #[test]
    fn distance_is_percentage_of_hand_size() {
        // hand size 100px, finger gap 50px -> 50%
        let f = frame_with(
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.05, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            1000.0,
            1000.0,
        );
        let d = f.normalized_distance().unwrap();
        assert!((d - 50.0).abs() < 1e-9);
    }

    #[test]
    fn distance_is_scale_invariant() {
        let near = frame_with(
            [0.1, 0.1, 0.0],
            [0.1, 0.1, 0.0],
            [0.2, 0.1, 0.0],
            [0.1, 0.3, 0.0],
            640.0,
            480.0,
        );
        // same hand twice as far away: all separations halved
        let far = frame_with(
            [0.1, 0.1, 0.0],
            [0.1, 0.1, 0.0],
            [0.15, 0.1, 0.0],
            [0.1, 0.2, 0.0],
            640.0,
            480.0,
        );
        let dn = near.normalized_distance().unwrap();
        let df = far.normalized_distance().unwrap();
        assert!((dn - df).abs() < 1e-9);
    }

    #[test]
    fn depth_counts_half() {
        let planar = frame_with(
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            1000.0,
            1000.0,
        );
        let depth_only = frame_with(
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.2],
            [0.1, 0.0, 0.0],
            1000.0,
            1000.0,
        );
        // a 0.2 z gap scaled by 0.5*width equals a 0.1 x gap
        let p = planar.normalized_distance().unwrap();
        let d = depth_only.normalized_distance().unwrap();
        assert!((p - d).abs() < 1e-9);
    }

    #[test]
    fn degenerate_hand_size_yields_none() {
        let f = frame_with(
            [0.5, 0.5, 0.0],
            [0.2, 0.2, 0.0],
            [0.8, 0.8, 0.0],
            [0.5, 0.5, 0.0],
            1280.0,
            720.0,
        );
        assert!(f.normalized_distance().is_none());
    }

    #[test]
    fn record_without_landmarks_has_no_frame() {
        let rec: FrameRecord =
            serde_json::from_str(r#"{"t_ms": 33, "width": 1280, "height": 720}"#).unwrap();
        assert!(rec.frame().is_none());
        assert!(rec.hand.is_none());
    }

    #[test]
    fn record_with_short_landmark_list_has_no_frame() {
        let rec: FrameRecord = serde_json::from_str(
            r#"{"t_ms": 33, "width": 1280, "height": 720, "landmarks": [[0.1, 0.2, 0.0]]}"#,
        )
        .unwrap();
        assert!(rec.frame().is_none());
    }

    #[test]
    fn record_roundtrip_with_hand_label() {
        let lm: Vec<[f64; 3]> = (0..LANDMARK_COUNT).map(|i| [i as f64 * 0.01, 0.5, 0.0]).collect();
        let json = serde_json::json!({
            "t_ms": 120,
            "width": 1280,
            "height": 720,
            "hand": "Right",
            "landmarks": lm,
        });
        let rec: FrameRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rec.hand, Some(Hand::Right));
        assert!(rec.frame().is_some());
    }
}
