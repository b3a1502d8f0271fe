//! Capture point normalization
//!
//! Maps client-space pointer samples onto the fixed logical canvas so that
//! every point in a session shares one coordinate space, whatever the display
//! scaling or input device.

use crate::capture::event::{CaptureSurface, PointerSample, RawPointerEvent, ValidationError};
use crate::error::CaptureError;
use crate::types::{CanvasSize, CapturePoint, PointerType, DEFAULT_PRESSURE, MAX_LOGICAL_COORDINATE};

/// Converts raw pointer events into [`CapturePoint`]s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturePointNormalizer {
    surface: CaptureSurface,
    canvas: CanvasSize,
}

impl CapturePointNormalizer {
    pub fn new(surface: CaptureSurface, canvas: CanvasSize) -> Result<Self, CaptureError> {
        surface.validate()?;
        canvas.validate()?;
        let normalizer = Self { surface, canvas };
        normalizer.check_scale()?;
        Ok(normalizer)
    }

    pub fn surface(&self) -> CaptureSurface {
        self.surface
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// Replace the surface rectangle after a layout change
    pub fn set_surface(&mut self, surface: CaptureSurface) -> Result<(), CaptureError> {
        surface.validate()?;
        Self {
            surface,
            canvas: self.canvas,
        }
        .check_scale()?;
        self.surface = surface;
        Ok(())
    }

    fn check_scale(&self) -> Result<(), CaptureError> {
        let (scale_x, scale_y) = self.scale();
        if !(scale_x.is_finite() && scale_y.is_finite()) {
            return Err(CaptureError::InvalidSurface(format!(
                "surface {}x{} cannot be scaled onto canvas {}x{}",
                self.surface.width, self.surface.height, self.canvas.width, self.canvas.height
            )));
        }
        Ok(())
    }

    /// Displayed-to-logical ratio on each axis
    pub fn scale(&self) -> (f64, f64) {
        (
            self.canvas.width / self.surface.width,
            self.canvas.height / self.surface.height,
        )
    }

    /// Convert one sample.
    ///
    /// `x = (client_x - left) * (W / displayed_width)`, `y` likewise. Missing or
    /// zero pressure becomes 0.5.
    pub fn normalize_sample(&self, sample: &PointerSample, pointer_type: PointerType) -> CapturePoint {
        let (scale_x, scale_y) = self.scale();
        CapturePoint {
            x: (sample.client_x - self.surface.left) * scale_x,
            y: (sample.client_y - self.surface.top) * scale_y,
            timestamp: sample.time_stamp,
            pressure: normalize_pressure(sample.pressure),
            pointer_type,
        }
    }

    /// Convert every sample an event carries, oldest first.
    ///
    /// Events delivering buffered samples yield one point per buffered sample;
    /// otherwise the dispatched position is used. Samples that land outside
    /// the accepted coordinate or time range are dropped.
    pub fn normalize(&self, event: &RawPointerEvent) -> Vec<CapturePoint> {
        let mut points: Vec<CapturePoint> = event_samples(event)
            .iter()
            .map(|sample| self.normalize_sample(sample, event.pointer_type))
            .filter(|point| {
                let keep = point.is_in_range();
                if !keep {
                    log::warn!(
                        "dropped out-of-range sample ({}, {}) at {}",
                        point.x,
                        point.y,
                        point.timestamp
                    );
                }
                keep
            })
            .collect();
        points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        points
    }

    /// Check an event and the logical position of every sample it carries
    pub fn validate_event(&self, event: &RawPointerEvent) -> Result<(), ValidationError> {
        event.validate()?;
        for sample in event_samples(event) {
            let point = self.normalize_sample(&sample, event.pointer_type);
            for (field, raw, projected) in [
                ("client_x", sample.client_x, point.x),
                ("client_y", sample.client_y, point.y),
            ] {
                if !(projected.abs() <= MAX_LOGICAL_COORDINATE) {
                    return Err(ValidationError::OutOfRange {
                        field: field.to_string(),
                        value: raw,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Buffered samples, or the dispatched position when there are none
fn event_samples(event: &RawPointerEvent) -> Vec<PointerSample> {
    if event.coalesced.is_empty() {
        vec![event.primary_sample()]
    } else {
        event.coalesced.clone()
    }
}

fn normalize_pressure(pressure: Option<f64>) -> f64 {
    match pressure {
        Some(p) if p > 0.0 => p.min(1.0),
        _ => DEFAULT_PRESSURE,
    }
}
