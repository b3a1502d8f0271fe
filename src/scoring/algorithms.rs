//! Built-in scoring algorithms
//!
//! Baseline heuristics that exercise the plugin contract. They are deliberately
//! simple and carry low confidence; they are not tuned detectors.

use std::sync::Arc;

use crate::error::ScoringError;
use crate::metrics::mean;
use crate::scoring::{ScoringAlgorithm, ScoringEngine};
use crate::types::{CaptchaSession, PointerType, ScoringResult};

/// Names of the algorithms shipped with the crate, in default registration order
pub const BUILTIN_ALGORITHMS: [&str; 3] = [
    VelocityUniformity::NAME,
    PauseRhythm::NAME,
    PressureVariance::NAME,
];

/// Engine with every built-in algorithm registered
pub fn default_engine() -> ScoringEngine {
    let mut engine = ScoringEngine::new();
    engine.register(VelocityUniformity);
    engine.register(PauseRhythm);
    engine.register(PressureVariance);
    engine
}

/// Look up a built-in algorithm by name
pub fn builtin_algorithm(name: &str) -> Option<Arc<dyn ScoringAlgorithm>> {
    match name {
        VelocityUniformity::NAME => Some(Arc::new(VelocityUniformity)),
        PauseRhythm::NAME => Some(Arc::new(PauseRhythm)),
        PressureVariance::NAME => Some(Arc::new(PressureVariance)),
        _ => None,
    }
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Flags strokes drawn at near-constant speed.
///
/// Hand-drawn strokes accelerate and brake, so their average velocity sits
/// well below their peak. Scripted paths tend to hold one speed, pushing the
/// `avg / max` ratio toward 1.
pub struct VelocityUniformity;

impl VelocityUniformity {
    pub const NAME: &'static str = "velocity_uniformity";

    /// Ratio at or below which a stroke looks fully human
    const HUMAN_RATIO: f64 = 0.5;
}

impl ScoringAlgorithm for VelocityUniformity {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn score(&self, session: &CaptchaSession) -> Result<ScoringResult, ScoringError> {
        let ratios: Vec<f64> = session
            .strokes
            .iter()
            .filter(|s| s.metrics.max_velocity > 0.0)
            .map(|s| s.metrics.avg_velocity / s.metrics.max_velocity)
            .collect();

        if ratios.is_empty() {
            return Err(ScoringError::InsufficientData(
                "no stroke with measurable velocity".to_string(),
            ));
        }

        let mean_ratio = mean(&ratios);
        let score = ((mean_ratio - Self::HUMAN_RATIO) / (1.0 - Self::HUMAN_RATIO)).clamp(0.0, 1.0);

        Ok(ScoringResult::new(score, 0.4)
            .with_signal("mean_velocity_ratio", mean_ratio)
            .with_signal("strokes_measured", ratios.len() as f64)
            .with_signal("session_avg_velocity", session.avg_velocity))
    }
}

/// Flags missing or metronome-regular pauses between strokes.
///
/// A submission without any drawing is treated as high risk. Negative pauses
/// are counted and reported, never corrected.
pub struct PauseRhythm;

impl PauseRhythm {
    pub const NAME: &'static str = "pause_rhythm";

    /// Coefficient of variation at or above which pauses look irregular enough
    const HUMAN_CV: f64 = 0.5;
}

impl ScoringAlgorithm for PauseRhythm {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn score(&self, session: &CaptchaSession) -> Result<ScoringResult, ScoringError> {
        if session.stroke_count == 0 {
            return Ok(ScoringResult::new(1.0, 0.2)
                .with_signal("stroke_count", 0.0)
                .with_details("submitted without drawing"));
        }

        if session.pauses.len() < 2 {
            return Err(ScoringError::InsufficientData(format!(
                "{} pause(s), need at least 2",
                session.pauses.len()
            )));
        }

        let negative_pauses = session.pauses.iter().filter(|&&p| p < 0.0).count();
        let mean_pause = mean(&session.pauses);
        let cv = if mean_pause > 0.0 {
            std_dev(&session.pauses) / mean_pause
        } else {
            0.0
        };
        let score = (1.0 - cv / Self::HUMAN_CV).clamp(0.0, 1.0);

        let mut result = ScoringResult::new(score, 0.3)
            .with_signal("mean_pause_ms", mean_pause)
            .with_signal("pause_cv", cv)
            .with_signal("negative_pauses", negative_pauses as f64);
        if negative_pauses > 0 {
            result = result.with_details(format!(
                "{} negative pause(s) passed through as measured",
                negative_pauses
            ));
        }
        Ok(result)
    }
}

/// Flags perfectly constant pressure from pressure-capable devices.
///
/// Mouse input never reports pressure, so sessions without pen or touch
/// samples yield no opinion.
pub struct PressureVariance;

impl PressureVariance {
    pub const NAME: &'static str = "pressure_variance";

    /// Standard deviation at or above which pressure looks naturally noisy
    const HUMAN_STD_DEV: f64 = 0.05;
}

impl ScoringAlgorithm for PressureVariance {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn score(&self, session: &CaptchaSession) -> Result<ScoringResult, ScoringError> {
        let pressures: Vec<f64> = session
            .strokes
            .iter()
            .flat_map(|s| s.points.iter())
            .filter(|p| p.pointer_type != PointerType::Mouse)
            .map(|p| p.pressure)
            .collect();

        if pressures.len() < 2 {
            return Err(ScoringError::InsufficientData(
                "no pressure-capable samples".to_string(),
            ));
        }

        let deviation = std_dev(&pressures);
        let score = (1.0 - deviation / Self::HUMAN_STD_DEV).clamp(0.0, 1.0);

        Ok(ScoringResult::new(score, 0.3)
            .with_signal("pressure_std_dev", deviation)
            .with_signal("pressure_mean", mean(&pressures))
            .with_signal("samples", pressures.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{build_session, SessionTiming};
    use crate::types::{CanvasSize, CapturePoint, Stroke};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn point(x: f64, t: f64, pressure: f64, pointer_type: PointerType) -> CapturePoint {
        CapturePoint {
            x,
            y: 0.0,
            timestamp: t,
            pressure,
            pointer_type,
        }
    }

    fn session(strokes: Vec<Stroke>) -> CaptchaSession {
        build_session(
            strokes,
            "draw a kite",
            CanvasSize::default(),
            SessionTiming {
                start_time: 0.0,
                end_time: 2000.0,
                started_at: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
            },
        )
    }

    /// Constant-speed mouse stroke
    fn robotic_stroke(id: u32, start: f64) -> Stroke {
        let points = (0..5)
            .map(|i| point(i as f64 * 10.0, start + i as f64 * 10.0, 0.5, PointerType::Mouse))
            .collect();
        Stroke::from_points(id, points).unwrap()
    }

    /// Accelerating then braking pen stroke with varying pressure
    fn hand_stroke(id: u32, start: f64) -> Stroke {
        let xs = [0.0, 1.0, 4.0, 20.0, 23.0, 24.0];
        let pressures = [0.2, 0.35, 0.6, 0.7, 0.45, 0.25];
        let points = xs
            .iter()
            .zip(pressures)
            .enumerate()
            .map(|(i, (&x, p))| point(x, start + i as f64 * 10.0, p, PointerType::Pen))
            .collect();
        Stroke::from_points(id, points).unwrap()
    }

    #[test]
    fn test_default_engine_order() {
        assert_eq!(default_engine().names(), BUILTIN_ALGORITHMS.to_vec());
    }

    #[test]
    fn test_builtin_lookup() {
        for name in BUILTIN_ALGORITHMS {
            assert_eq!(builtin_algorithm(name).unwrap().name(), name);
        }
        assert!(builtin_algorithm("nope").is_none());
    }

    #[test]
    fn test_velocity_uniformity_separates_constant_speed() {
        let robotic = VelocityUniformity
            .score(&session(vec![robotic_stroke(0, 0.0)]))
            .unwrap();
        let human = VelocityUniformity
            .score(&session(vec![hand_stroke(0, 0.0)]))
            .unwrap();

        assert_eq!(robotic.score, 1.0);
        assert!(human.score < robotic.score);
        assert!(robotic.is_well_formed() && human.is_well_formed());
    }

    #[test]
    fn test_velocity_uniformity_needs_motion() {
        let result = VelocityUniformity.score(&session(Vec::new()));
        assert!(matches!(result, Err(ScoringError::InsufficientData(_))));
    }

    #[test]
    fn test_pause_rhythm_penalizes_empty_submission() {
        let result = PauseRhythm.score(&session(Vec::new())).unwrap();
        assert_eq!(result.score, 1.0);
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_pause_rhythm_regular_vs_irregular() {
        // Pauses 60, 60 -> perfectly regular
        let regular = session(vec![
            robotic_stroke(0, 0.0),
            robotic_stroke(1, 100.0),
            robotic_stroke(2, 200.0),
        ]);
        let result = PauseRhythm.score(&regular).unwrap();
        assert_eq!(result.score, 1.0);

        // Pauses 10, 260 -> highly irregular
        let irregular = session(vec![
            robotic_stroke(0, 0.0),
            robotic_stroke(1, 50.0),
            robotic_stroke(2, 350.0),
        ]);
        let result = PauseRhythm.score(&irregular).unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_pause_rhythm_reports_negative_pauses() {
        let session = session(vec![
            robotic_stroke(0, 0.0),
            robotic_stroke(1, 30.0), // starts before stroke 0 ends at 40
            robotic_stroke(2, 200.0),
        ]);
        assert_eq!(session.pauses[0], -10.0);

        let result = PauseRhythm.score(&session).unwrap();
        assert_eq!(result.signals["negative_pauses"], 1.0);
        assert!(result.details.is_some());
    }

    #[test]
    fn test_pressure_variance_ignores_mouse() {
        let result = PressureVariance.score(&session(vec![robotic_stroke(0, 0.0)]));
        assert!(matches!(result, Err(ScoringError::InsufficientData(_))));

        let result = PressureVariance.score(&session(vec![hand_stroke(0, 0.0)])).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.signals["samples"], 6.0);
    }

    #[test]
    fn test_default_engine_combined_score_in_range() {
        let engine = default_engine();
        let session = session(vec![hand_stroke(0, 0.0), hand_stroke(1, 120.0), hand_stroke(2, 400.0)]);

        let evaluation = engine.evaluate(&session);
        assert_eq!(evaluation.len(), 3);
        let combined = evaluation.combined_score();
        assert!((0.0..=1.0).contains(&combined));
    }
}
