//! Stroke kinematics
//!
//! Computes path length, velocity, acceleration and direction-change metrics
//! from the ordered points of a single stroke.

use std::f64::consts::PI;

use crate::types::{CapturePoint, StrokeMetrics};

/// Bearing change (radians) above which a segment counts as a direction change
pub const DIRECTION_CHANGE_THRESHOLD_RAD: f64 = PI / 6.0;

/// Compute the kinematic metrics of one stroke.
///
/// Segments with a non-positive time delta still contribute to `length` but are
/// left out of the velocity series, so they never produce a division by zero
/// or a spurious spike. Acceleration is magnitude-only: `|v[i] - v[i-1]| / dt[i]`.
///
/// Fewer than two points yields the all-zero record.
pub fn compute_stroke_metrics(points: &[CapturePoint]) -> StrokeMetrics {
    if points.len() < 2 {
        return StrokeMetrics::default();
    }

    let mut length = 0.0;
    let mut velocities: Vec<f64> = Vec::with_capacity(points.len() - 1);
    let mut accelerations: Vec<f64> = Vec::with_capacity(points.len().saturating_sub(2));
    let mut direction_changes = 0u32;
    let mut prev_bearing: Option<f64> = None;

    for pair in points.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let dx = curr.x - prev.x;
        let dy = curr.y - prev.y;
        let distance = (dx * dx + dy * dy).sqrt();
        length += distance;

        let dt = curr.timestamp - prev.timestamp;
        if dt > 0.0 {
            let velocity = distance / dt;
            if let Some(&last) = velocities.last() {
                accelerations.push((velocity - last).abs() / dt);
            }
            velocities.push(velocity);
        }

        let bearing = dy.atan2(dx);
        if let Some(prev_bearing) = prev_bearing {
            if bearing_difference(prev_bearing, bearing) > DIRECTION_CHANGE_THRESHOLD_RAD {
                direction_changes += 1;
            }
        }
        prev_bearing = Some(bearing);
    }

    StrokeMetrics {
        length,
        duration: points[points.len() - 1].timestamp - points[0].timestamp,
        avg_velocity: mean(&velocities),
        max_velocity: max(&velocities),
        avg_acceleration: mean(&accelerations),
        max_acceleration: max(&accelerations),
        direction_changes,
    }
}

/// Absolute angle between two bearings, wrapped into [0, π]
fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (b - a).abs();
    if diff > PI {
        2.0 * PI - diff
    } else {
        diff
    }
}

/// Arithmetic mean, 0 for an empty series.
///
/// Falls back to summing pre-divided terms when the plain sum overflows, so a
/// series of finite values always has a finite mean.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    if sum.is_finite() {
        sum / n
    } else {
        values.iter().map(|v| v / n).sum()
    }
}

/// Series maximum, 0 for an empty series
fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}
