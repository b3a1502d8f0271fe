//! Session aggregation
//!
//! Folds the finalized strokes of one challenge attempt into a single
//! immutable [`CaptchaSession`], and owns the JSON boundary for sessions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CaptureError;
use crate::metrics::mean;
use crate::types::{CanvasSize, CaptchaSession, Stroke};

/// Time window of a challenge attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTiming {
    /// Monotonic start (ms)
    pub start_time: f64,
    /// Monotonic end (ms)
    pub end_time: f64,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
}

impl SessionTiming {
    /// Window spanning the first stroke's start to the last stroke's end.
    ///
    /// With no strokes the window is empty at t = 0.
    pub fn spanning(strokes: &[Stroke], started_at: DateTime<Utc>) -> Self {
        let start_time = strokes.first().map(|s| s.start_time).unwrap_or(0.0);
        let end_time = strokes.last().map(|s| s.end_time).unwrap_or(start_time);
        Self {
            start_time,
            end_time,
            started_at,
        }
    }
}

/// Build the session record for one attempt.
///
/// Strokes are kept in the order given; that order drives the pause list.
/// `avg_velocity` is the unweighted mean of per-stroke average velocities,
/// not a pooled velocity over every point. A fresh UUID v4 is generated for
/// each call.
pub fn build_session(
    strokes: Vec<Stroke>,
    prompt: impl Into<String>,
    canvas: CanvasSize,
    timing: SessionTiming,
) -> CaptchaSession {
    let pauses = compute_pauses(&strokes);
    let total_path_length = strokes.iter().map(|s| s.metrics.length).sum();
    let stroke_velocities: Vec<f64> = strokes.iter().map(|s| s.metrics.avg_velocity).collect();
    let avg_velocity = mean(&stroke_velocities);

    let session = CaptchaSession {
        session_id: Uuid::new_v4().to_string(),
        prompt: prompt.into(),
        stroke_count: strokes.len() as u32,
        strokes,
        start_time: timing.start_time,
        end_time: timing.end_time,
        started_at: timing.started_at,
        canvas,
        total_duration: timing.end_time - timing.start_time,
        pauses,
        total_path_length,
        avg_velocity,
    };

    log::debug!(
        "built session {} with {} strokes",
        session.session_id,
        session.stroke_count
    );

    session
}

/// Gaps between adjacent strokes in recorded order.
///
/// `pauses[i] = strokes[i + 1].start_time - strokes[i].end_time`. Negative gaps
/// (clock disagreement) are kept as-is and reported at warn level.
pub fn compute_pauses(strokes: &[Stroke]) -> Vec<f64> {
    strokes
        .windows(2)
        .map(|pair| {
            let pause = pair[1].start_time - pair[0].end_time;
            if pause < 0.0 {
                log::warn!(
                    "negative pause of {:.3}ms between strokes {} and {}",
                    pause,
                    pair[0].id,
                    pair[1].id
                );
            }
            pause
        })
        .collect()
}

/// Check the structural invariants of a session received from outside
pub fn validate_session(session: &CaptchaSession) -> Result<(), CaptureError> {
    if session.stroke_count as usize != session.strokes.len() {
        return Err(CaptureError::InvalidSession(format!(
            "stroke_count is {} but {} strokes are present",
            session.stroke_count,
            session.strokes.len()
        )));
    }

    let expected_pauses = session.strokes.len().saturating_sub(1);
    if session.pauses.len() != expected_pauses {
        return Err(CaptureError::InvalidSession(format!(
            "expected {} pauses, found {}",
            expected_pauses,
            session.pauses.len()
        )));
    }

    if let Some(stroke) = session.strokes.iter().find(|s| s.points.len() < 2) {
        return Err(CaptureError::InvalidSession(format!(
            "stroke {} has fewer than two points",
            stroke.id
        )));
    }

    Ok(())
}

/// Parse a session JSON document and check its invariants
pub fn parse_session(json: &str) -> Result<CaptchaSession, CaptureError> {
    let session: CaptchaSession = serde_json::from_str(json)
        .map_err(|e| CaptureError::ParseError(format!("Failed to parse captcha session: {}", e)))?;
    validate_session(&session)?;
    Ok(session)
}

/// Serialize a session to JSON
pub fn session_to_json(session: &CaptchaSession) -> Result<String, CaptureError> {
    serde_json::to_string(session).map_err(|e| CaptureError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapturePoint, PointerType};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn point(x: f64, y: f64, timestamp: f64) -> CapturePoint {
        CapturePoint {
            x,
            y,
            timestamp,
            pressure: 0.37,
            pointer_type: PointerType::Pen,
        }
    }

    /// Horizontal stroke of `len` units from `start` to `end`
    fn stroke(id: u32, start: f64, end: f64, len: f64) -> Stroke {
        Stroke::from_points(id, vec![point(0.0, 0.0, start), point(len, 0.0, end)]).unwrap()
    }

    fn timing(start_time: f64, end_time: f64) -> SessionTiming {
        SessionTiming {
            start_time,
            end_time,
            started_at: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_pause_between_two_strokes() {
        let strokes = vec![stroke(0, 0.0, 100.0, 50.0), stroke(1, 150.0, 250.0, 50.0)];
        assert_eq!(compute_pauses(&strokes), vec![50.0]);
    }

    #[test]
    fn test_pause_count_matches_stroke_count() {
        for n in 0..5u32 {
            let strokes: Vec<Stroke> = (0..n)
                .map(|i| stroke(i, i as f64 * 200.0, i as f64 * 200.0 + 100.0, 10.0))
                .collect();
            let session = build_session(strokes, "draw a cat", CanvasSize::default(), timing(0.0, 1000.0));

            assert_eq!(session.stroke_count, n);
            assert_eq!(session.pauses.len(), n.saturating_sub(1) as usize);
            assert!(session.pauses.iter().all(|&p| (p - 100.0).abs() < 1e-9));
        }
    }

    #[test]
    fn test_negative_pause_is_not_clamped() {
        let strokes = vec![stroke(0, 0.0, 100.0, 10.0), stroke(1, 90.0, 200.0, 10.0)];
        assert_eq!(compute_pauses(&strokes), vec![-10.0]);
    }

    #[test]
    fn test_aggregates_use_two_level_mean() {
        // Stroke A: 100 units over 100ms -> 1.0; stroke B: 10 units over 100ms -> 0.1
        let strokes = vec![stroke(0, 0.0, 100.0, 100.0), stroke(1, 200.0, 300.0, 10.0)];
        let session = build_session(strokes, "draw a house", CanvasSize::default(), timing(0.0, 300.0));

        assert!((session.total_path_length - 110.0).abs() < 1e-9);
        // Mean of per-stroke averages, not 110 / 200
        assert!((session.avg_velocity - 0.55).abs() < 1e-9);
        assert_eq!(session.total_duration, 300.0);
    }

    #[test]
    fn test_empty_session_is_representable() {
        let session = build_session(Vec::new(), "draw a tree", CanvasSize::default(), timing(0.0, 0.0));

        assert_eq!(session.stroke_count, 0);
        assert!(session.pauses.is_empty());
        assert_eq!(session.total_path_length, 0.0);
        assert_eq!(session.avg_velocity, 0.0);
        assert!(validate_session(&session).is_ok());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = build_session(Vec::new(), "p", CanvasSize::default(), timing(0.0, 0.0));
        let b = build_session(Vec::new(), "p", CanvasSize::default(), timing(0.0, 0.0));
        assert_ne!(a.session_id, b.session_id);
        assert!(Uuid::parse_str(&a.session_id).is_ok());
    }

    #[test]
    fn test_timing_spanning_strokes() {
        let strokes = vec![stroke(0, 40.0, 100.0, 10.0), stroke(1, 150.0, 260.0, 10.0)];
        let started_at = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let timing = SessionTiming::spanning(&strokes, started_at);
        assert_eq!(timing.start_time, 40.0);
        assert_eq!(timing.end_time, 260.0);

        let empty = SessionTiming::spanning(&[], started_at);
        assert_eq!(empty.start_time, 0.0);
        assert_eq!(empty.end_time, 0.0);
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let strokes = vec![
            Stroke::from_points(
                0,
                vec![
                    point(0.1, 0.2, 1000.123456789),
                    point(1.0 / 3.0, 2.0 / 7.0, 1016.7),
                    point(12.345678901234567, 99.9, 1033.4),
                ],
            )
            .unwrap(),
            stroke(1, 1200.5, 1300.25, 17.0 / 3.0),
        ];
        let session = build_session(strokes, "draw a star", CanvasSize::default(), timing(990.0, 1400.0));

        let json = session_to_json(&session).unwrap();
        let parsed = parse_session(&json).unwrap();

        assert_eq!(parsed, session);
        assert_eq!(parsed.strokes[0].points[1].x, 1.0 / 3.0);
        assert_eq!(parsed.strokes[1].id, 1);
    }

    #[test]
    fn test_parse_rejects_inconsistent_counts() {
        let mut session = build_session(
            vec![stroke(0, 0.0, 10.0, 5.0)],
            "draw a fish",
            CanvasSize::default(),
            timing(0.0, 10.0),
        );
        session.stroke_count = 2;
        let json = serde_json::to_string(&session).unwrap();

        let result = parse_session(&json);
        assert!(matches!(result, Err(CaptureError::InvalidSession(_))));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(parse_session("not json"), Err(CaptureError::ParseError(_))));
    }
}
