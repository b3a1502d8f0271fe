//! inkcheck.capture_log.v1 schema
//!
//! Raw pointer events as dispatched by the input layer, plus the capture log
//! document that records one attempt's events for replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::normalizer::CapturePointNormalizer;
use crate::error::CaptureError;
use crate::types::{CanvasSize, PointerType, MAX_TIMESTAMP_MS};

/// Current capture log schema version
pub const CAPTURE_LOG_VERSION: &str = "inkcheck.capture_log.v1";

/// Pointer lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
    Cancel,
    Leave,
}

/// One buffered sample carried by a high-frequency pointer event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub client_x: f64,
    pub client_y: f64,
    /// High-resolution monotonic time stamp (ms)
    pub time_stamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
}

/// A pointer event in client (on-screen) coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPointerEvent {
    pub kind: PointerEventKind,
    pub pointer_type: PointerType,
    pub client_x: f64,
    pub client_y: f64,
    /// High-resolution monotonic time stamp (ms)
    pub time_stamp: f64,
    /// Reported pressure; absent for most mice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    /// Buffered samples delivered with this event, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coalesced: Vec<PointerSample>,
}

impl RawPointerEvent {
    pub fn new(
        kind: PointerEventKind,
        pointer_type: PointerType,
        client_x: f64,
        client_y: f64,
        time_stamp: f64,
    ) -> Self {
        Self {
            kind,
            pointer_type,
            client_x,
            client_y,
            time_stamp,
            pressure: None,
            coalesced: Vec::new(),
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }

    pub fn with_coalesced(mut self, samples: Vec<PointerSample>) -> Self {
        self.coalesced = samples;
        self
    }

    /// The dispatched position as a sample
    pub fn primary_sample(&self) -> PointerSample {
        PointerSample {
            client_x: self.client_x,
            client_y: self.client_y,
            time_stamp: self.time_stamp,
            pressure: self.pressure,
        }
    }

    /// Check values a sane input layer never produces
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_sample(&self.primary_sample())?;
        for sample in &self.coalesced {
            validate_sample(sample)?;
        }
        Ok(())
    }
}

fn validate_sample(sample: &PointerSample) -> Result<(), ValidationError> {
    for (field, value) in [
        ("client_x", sample.client_x),
        ("client_y", sample.client_y),
        ("time_stamp", sample.time_stamp),
    ] {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite {
                field: field.to_string(),
            });
        }
    }

    if sample.time_stamp.abs() > MAX_TIMESTAMP_MS {
        return Err(ValidationError::OutOfRange {
            field: "time_stamp".to_string(),
            value: sample.time_stamp,
        });
    }

    if let Some(pressure) = sample.pressure {
        if !(0.0..=1.0).contains(&pressure) {
            return Err(ValidationError::PressureOutOfRange(pressure));
        }
    }

    Ok(())
}

/// On-screen rectangle of the capture surface (client coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureSurface {
    pub left: f64,
    pub top: f64,
    /// Displayed width
    pub width: f64,
    /// Displayed height
    pub height: f64,
}

impl CaptureSurface {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Surface displayed at exactly the logical canvas size
    pub fn matching(canvas: CanvasSize) -> Self {
        Self::new(0.0, 0.0, canvas.width, canvas.height)
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(self.left.is_finite() && self.top.is_finite()) {
            return Err(CaptureError::InvalidSurface(
                "surface origin must be finite".to_string(),
            ));
        }
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(CaptureError::InvalidSurface(format!(
                "surface size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Recorded events of one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureLog {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Challenge prompt shown to the user
    pub prompt: String,
    /// Surface rectangle the events were captured against
    pub surface: CaptureSurface,
    /// Logical canvas to normalize into
    #[serde(default)]
    pub canvas: CanvasSize,
    /// Monotonic time the challenge was shown; defaults to the first event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// Monotonic submit time; defaults to the last event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Wall-clock start; defaults to replay time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Events in dispatch order
    pub events: Vec<RawPointerEvent>,
}

fn default_schema_version() -> String {
    CAPTURE_LOG_VERSION.to_string()
}

impl CaptureLog {
    pub fn new(prompt: impl Into<String>, surface: CaptureSurface) -> Self {
        Self {
            schema_version: default_schema_version(),
            prompt: prompt.into(),
            surface,
            canvas: CanvasSize::default(),
            start_time: None,
            end_time: None,
            started_at: None,
            events: Vec::new(),
        }
    }

    pub fn with_canvas(mut self, canvas: CanvasSize) -> Self {
        self.canvas = canvas;
        self
    }

    pub fn with_events(mut self, events: Vec<RawPointerEvent>) -> Self {
        self.events = events;
        self
    }

    /// Parse a capture log JSON document
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::ParseError(format!("Failed to parse capture log: {}", e)))
    }

    /// Check the document header (version, surface, canvas)
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.schema_version != CAPTURE_LOG_VERSION {
            return Err(CaptureError::ParseError(
                ValidationError::InvalidSchemaVersion {
                    expected: CAPTURE_LOG_VERSION.to_string(),
                    actual: self.schema_version.clone(),
                }
                .to_string(),
            ));
        }
        CapturePointNormalizer::new(self.surface, self.canvas)?;
        for (field, value) in [("start_time", self.start_time), ("end_time", self.end_time)] {
            if let Some(t) = value {
                if !(t.is_finite() && t.abs() <= MAX_TIMESTAMP_MS) {
                    return Err(CaptureError::InvalidEvent(format!(
                        "{} must be a finite time stamp, got {}",
                        field, t
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate every event, returning only the failures.
    ///
    /// When the header is usable, positions are also checked after projection
    /// onto the logical canvas.
    pub fn validate_events(&self) -> Vec<ValidationResult> {
        let normalizer = CapturePointNormalizer::new(self.surface, self.canvas).ok();
        self.events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| {
                let checked = match &normalizer {
                    Some(normalizer) => normalizer.validate_event(event),
                    None => event.validate(),
                };
                checked.err().map(|error| ValidationResult { index, error })
            })
            .collect()
    }
}

/// A failed event check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub error: ValidationError,
}

/// Capture log validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Non-finite value in {field}")]
    NonFinite { field: String },

    #[error("Pressure {0} outside [0, 1]")]
    PressureOutOfRange(f64),

    #[error("Value {value} in {field} is outside the accepted range")]
    OutOfRange { field: String, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserialization() {
        let json = r#"{
            "kind": "move",
            "pointer_type": "pen",
            "client_x": 120.5,
            "client_y": 48.0,
            "time_stamp": 1532.25,
            "pressure": 0.62,
            "coalesced": [
                { "client_x": 118.0, "client_y": 47.0, "time_stamp": 1528.1, "pressure": 0.6 },
                { "client_x": 120.5, "client_y": 48.0, "time_stamp": 1532.25, "pressure": 0.62 }
            ]
        }"#;

        let event: RawPointerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, PointerEventKind::Move);
        assert_eq!(event.pointer_type, PointerType::Pen);
        assert_eq!(event.coalesced.len(), 2);
        assert_eq!(event.coalesced[0].time_stamp, 1528.1);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_mouse_event_without_pressure() {
        let json = r#"{"kind":"down","pointer_type":"mouse","client_x":1,"client_y":2,"time_stamp":3}"#;
        let event: RawPointerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.pressure, None);
        assert!(event.coalesced.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_pressure() {
        let event = RawPointerEvent::new(PointerEventKind::Move, PointerType::Pen, 1.0, 1.0, 5.0)
            .with_pressure(1.7);
        assert_eq!(event.validate(), Err(ValidationError::PressureOutOfRange(1.7)));
    }

    #[test]
    fn test_validate_rejects_non_finite_coalesced_sample() {
        let event = RawPointerEvent::new(PointerEventKind::Move, PointerType::Touch, 1.0, 1.0, 5.0)
            .with_coalesced(vec![PointerSample {
                client_x: f64::NAN,
                client_y: 0.0,
                time_stamp: 4.0,
                pressure: None,
            }]);
        assert!(matches!(event.validate(), Err(ValidationError::NonFinite { .. })));
    }

    #[test]
    fn test_surface_validation() {
        assert!(CaptureSurface::new(10.0, 20.0, 400.0, 300.0).validate().is_ok());
        assert!(CaptureSurface::new(0.0, 0.0, 0.0, 300.0).validate().is_err());
        assert!(CaptureSurface::new(0.0, f64::INFINITY, 10.0, 10.0).validate().is_err());
    }

    #[test]
    fn test_capture_log_defaults() {
        let json = r#"{
            "prompt": "draw a boat",
            "surface": { "left": 0, "top": 0, "width": 400, "height": 300 },
            "events": []
        }"#;

        let log = CaptureLog::from_json(json).unwrap();
        assert_eq!(log.schema_version, CAPTURE_LOG_VERSION);
        assert_eq!(log.canvas, CanvasSize::default());
        assert!(log.start_time.is_none());
        assert!(log.validate().is_ok());
    }

    #[test]
    fn test_capture_log_wrong_version() {
        let mut log = CaptureLog::new("p", CaptureSurface::new(0.0, 0.0, 10.0, 10.0));
        log.schema_version = "other.v2".to_string();
        assert!(log.validate().is_err());
    }

    #[test]
    fn test_validate_events_reports_indices() {
        let good = RawPointerEvent::new(PointerEventKind::Down, PointerType::Mouse, 1.0, 1.0, 0.0);
        let bad = good.clone().with_pressure(-0.2);
        let log = CaptureLog::new("p", CaptureSurface::new(0.0, 0.0, 10.0, 10.0))
            .with_events(vec![good.clone(), bad, good]);

        let failures = log.validate_events();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
    }

    #[test]
    fn test_capture_log_rejects_unusable_canvas_and_times() {
        let surface = CaptureSurface::new(0.0, 0.0, 400.0, 300.0);
        let log = CaptureLog::new("p", surface).with_canvas(CanvasSize {
            width: f64::INFINITY,
            height: 600.0,
        });
        assert!(matches!(log.validate(), Err(CaptureError::InvalidSurface(_))));

        let mut log = CaptureLog::new("p", surface);
        log.end_time = Some(f64::NAN);
        assert!(matches!(log.validate(), Err(CaptureError::InvalidEvent(_))));
    }

    #[test]
    fn test_validate_events_rejects_extreme_values() {
        let surface = CaptureSurface::matching(CanvasSize::default());
        let events = vec![
            RawPointerEvent::new(PointerEventKind::Down, PointerType::Mouse, -1.0e308, 0.0, 0.0),
            RawPointerEvent::new(PointerEventKind::Move, PointerType::Mouse, 10.0, 0.0, 1.0e300),
            RawPointerEvent::new(PointerEventKind::Move, PointerType::Mouse, 10.0, 0.0, 20.0),
        ];
        let log = CaptureLog::new("p", surface).with_events(events);

        let failures = log.validate_events();
        assert_eq!(
            failures,
            vec![
                ValidationResult {
                    index: 0,
                    error: ValidationError::OutOfRange {
                        field: "client_x".to_string(),
                        value: -1.0e308,
                    },
                },
                ValidationResult {
                    index: 1,
                    error: ValidationError::OutOfRange {
                        field: "time_stamp".to_string(),
                        value: 1.0e300,
                    },
                },
            ]
        );
    }
}
