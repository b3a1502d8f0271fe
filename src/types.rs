//! Shared data contracts
//!
//! These types flow through the capture → metrics → session → scoring pipeline.
//! Their serde field set is the serialization contract handed to any consumer
//! of a finished session (logging, transport, visualization).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CaptureError;

/// Pressure assumed when the device reports none (mice, most trackpads)
pub const DEFAULT_PRESSURE: f64 = 0.5;

/// Score value meaning "no usable opinion"
pub const SENTINEL_SCORE: f64 = -1.0;

/// Largest logical coordinate magnitude a point may carry
pub const MAX_LOGICAL_COORDINATE: f64 = 1.0e9;

/// Largest timestamp magnitude (ms) a point may carry
pub const MAX_TIMESTAMP_MS: f64 = 1.0e15;

/// Input modality that produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerType {
    Mouse,
    Touch,
    Pen,
}

impl PointerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerType::Mouse => "mouse",
            PointerType::Touch => "touch",
            PointerType::Pen => "pen",
        }
    }
}

/// One sampled instant of contact, in logical canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapturePoint {
    /// Logical x coordinate
    pub x: f64,
    /// Logical y coordinate
    pub y: f64,
    /// Monotonic high-resolution timestamp in milliseconds
    pub timestamp: f64,
    /// Contact pressure (0-1)
    pub pressure: f64,
    /// Device that produced the sample
    pub pointer_type: PointerType,
}

impl CapturePoint {
    /// Whether position and time are finite and within the accepted range
    pub fn is_in_range(&self) -> bool {
        self.x.abs() <= MAX_LOGICAL_COORDINATE
            && self.y.abs() <= MAX_LOGICAL_COORDINATE
            && self.timestamp.abs() <= MAX_TIMESTAMP_MS
    }
}

/// Fixed logical canvas every point is normalized into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl CanvasSize {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(CaptureError::InvalidSurface(format!(
                "logical canvas must be positive and finite, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Kinematic summary of one stroke
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokeMetrics {
    /// Total path length in logical units
    pub length: f64,
    /// Last timestamp minus first timestamp (ms)
    pub duration: f64,
    /// Mean segment velocity (logical units per ms)
    pub avg_velocity: f64,
    /// Peak segment velocity (logical units per ms)
    pub max_velocity: f64,
    /// Mean absolute velocity change per ms
    pub avg_acceleration: f64,
    /// Peak absolute velocity change per ms
    pub max_acceleration: f64,
    /// Segment-to-segment bearing changes above 30 degrees
    pub direction_changes: u32,
}

impl StrokeMetrics {
    fn is_finite(&self) -> bool {
        [
            self.length,
            self.duration,
            self.avg_velocity,
            self.max_velocity,
            self.avg_acceleration,
            self.max_acceleration,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// One continuous contact gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Identifier unique within its session, assigned from 0
    pub id: u32,
    /// Ordered samples
    pub points: Vec<CapturePoint>,
    /// Timestamp of the first point
    pub start_time: f64,
    /// Timestamp of the last point
    pub end_time: f64,
    /// Metrics computed when the stroke was finalized
    pub metrics: StrokeMetrics,
}

impl Stroke {
    /// Finalize a gesture into a stroke.
    ///
    /// Returns `None` for gestures with fewer than two points, and for
    /// gestures whose metrics overflow (e.g. a jump across sub-nanosecond
    /// time stamps); those are discarded rather than treated as errors.
    pub fn from_points(id: u32, points: Vec<CapturePoint>) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let metrics = crate::metrics::compute_stroke_metrics(&points);
        if !metrics.is_finite() {
            return None;
        }
        let start_time = points[0].timestamp;
        let end_time = points[points.len() - 1].timestamp;

        Some(Self {
            id,
            points,
            start_time,
            end_time,
            metrics,
        })
    }
}

/// The complete record of one challenge attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptchaSession {
    /// Unique session identifier (UUID v4)
    pub session_id: String,
    /// Challenge prompt shown to the user
    pub prompt: String,
    /// Strokes in drawing order
    pub strokes: Vec<Stroke>,
    /// Monotonic start time (ms)
    pub start_time: f64,
    /// Monotonic end time (ms)
    pub end_time: f64,
    /// Wall-clock start of the attempt
    pub started_at: DateTime<Utc>,
    /// Logical canvas the coordinates are relative to
    pub canvas: CanvasSize,
    /// `end_time - start_time`
    pub total_duration: f64,
    /// Number of retained strokes
    pub stroke_count: u32,
    /// Gaps between consecutive strokes (ms), unclamped
    pub pauses: Vec<f64>,
    /// Sum of stroke lengths
    pub total_path_length: f64,
    /// Mean of per-stroke average velocities
    pub avg_velocity: f64,
}

/// Output of one scoring algorithm against one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Risk score (0-1), or -1 for "no opinion"
    pub score: f64,
    /// Weight this opinion deserves (0-1)
    pub confidence: f64,
    /// Diagnostic values for audit; never re-scored
    #[serde(default)]
    pub signals: BTreeMap<String, f64>,
    /// Free-text notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ScoringResult {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score,
            confidence,
            signals: BTreeMap::new(),
            details: None,
        }
    }

    /// Result standing in for an algorithm that could not produce an opinion
    pub fn sentinel(details: impl Into<String>) -> Self {
        Self {
            score: SENTINEL_SCORE,
            confidence: 0.0,
            signals: BTreeMap::new(),
            details: Some(details.into()),
        }
    }

    pub fn with_signal(mut self, name: impl Into<String>, value: f64) -> Self {
        self.signals.insert(name.into(), value);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_sentinel(&self) -> bool {
        self.score < 0.0
    }

    /// Whether the values are inside the ranges the contract allows
    pub fn is_well_formed(&self) -> bool {
        let score_ok = self.score == SENTINEL_SCORE || (0.0..=1.0).contains(&self.score);
        score_ok && (0.0..=1.0).contains(&self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64, timestamp: f64) -> CapturePoint {
        CapturePoint {
            x,
            y,
            timestamp,
            pressure: DEFAULT_PRESSURE,
            pointer_type: PointerType::Mouse,
        }
    }

    #[test]
    fn test_pointer_type_serialization() {
        let json = serde_json::to_string(&PointerType::Pen).unwrap();
        assert_eq!(json, "\"pen\"");

        let parsed: PointerType = serde_json::from_str("\"touch\"").unwrap();
        assert_eq!(parsed, PointerType::Touch);
    }

    #[test]
    fn test_stroke_requires_two_points() {
        assert!(Stroke::from_points(0, vec![]).is_none());
        assert!(Stroke::from_points(0, vec![point(1.0, 1.0, 0.0)]).is_none());

        let stroke = Stroke::from_points(3, vec![point(0.0, 0.0, 5.0), point(3.0, 4.0, 15.0)])
            .unwrap();
        assert_eq!(stroke.id, 3);
        assert_eq!(stroke.start_time, 5.0);
        assert_eq!(stroke.end_time, 15.0);
        assert_eq!(stroke.metrics.length, 5.0);
    }

    #[test]
    fn test_stroke_with_overflowing_velocity_is_discarded() {
        // 1e9 units over the smallest positive time step
        let points = vec![point(0.0, 0.0, 0.0), point(1.0e9, 0.0, f64::from_bits(1))];
        assert!(Stroke::from_points(0, points).is_none());
    }

    #[test]
    fn test_point_range() {
        assert!(point(800.0, -600.0, 1.0e12).is_in_range());
        assert!(!point(1.0e308, 0.0, 0.0).is_in_range());
        assert!(!point(0.0, f64::NAN, 0.0).is_in_range());
        assert!(!point(0.0, 0.0, f64::INFINITY).is_in_range());
    }

    #[test]
    fn test_canvas_validation() {
        assert!(CanvasSize::default().validate().is_ok());
        for (width, height) in [(0.0, 600.0), (800.0, -1.0), (f64::INFINITY, 600.0), (800.0, f64::NAN)] {
            assert!(CanvasSize { width, height }.validate().is_err());
        }
    }

    #[test]
    fn test_sentinel_result() {
        let result = ScoringResult::sentinel("boom");
        assert!(result.is_sentinel());
        assert_eq!(result.score, -1.0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.signals.is_empty());
        assert_eq!(result.details.as_deref(), Some("boom"));
        assert!(result.is_well_formed());
    }

    #[test]
    fn test_result_range_check() {
        assert!(ScoringResult::new(0.0, 1.0).is_well_formed());
        assert!(!ScoringResult::new(1.5, 1.0).is_well_formed());
        assert!(!ScoringResult::new(-0.5, 1.0).is_well_formed());
        assert!(!ScoringResult::new(0.5, 2.0).is_well_formed());
        assert!(!ScoringResult::new(f64::NAN, 0.5).is_well_formed());
    }

    #[test]
    fn test_scoring_result_omits_empty_details() {
        let json = serde_json::to_value(ScoringResult::new(0.3, 0.9).with_signal("a", 1.0)).unwrap();
        assert!(json.get("details").is_none());
        assert_eq!(json["signals"]["a"], 1.0);
    }
}
