//! Pipeline orchestration
//!
//! Public API for going from a recorded capture log (or an already built
//! session) to a verdict report.
//!
//! Pipeline: capture log JSON → replay → session → scoring engine → verdict JSON

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capture::{replay_capture_log, CaptureLog};
use crate::error::CaptureError;
use crate::scoring::{default_engine, Evaluation, ScoringEngine};
use crate::session::parse_session;
use crate::types::{CanvasSize, CaptchaSession};
use crate::{INKCHECK_VERSION, PRODUCER_NAME};

/// Combined score below which a session reads as human
pub const LIKELY_HUMAN_BELOW: f64 = 0.4;

/// Combined score at or above which a session reads as automated
pub const LIKELY_AUTOMATED_FROM: f64 = 0.7;

/// Coarse reading of a combined score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No algorithm produced a usable opinion
    NoVerdict,
    LikelyHuman,
    Uncertain,
    LikelyAutomated,
}

impl Verdict {
    pub fn from_score(combined_score: f64) -> Self {
        if combined_score < 0.0 {
            Verdict::NoVerdict
        } else if combined_score < LIKELY_HUMAN_BELOW {
            Verdict::LikelyHuman
        } else if combined_score < LIKELY_AUTOMATED_FROM {
            Verdict::Uncertain
        } else {
            Verdict::LikelyAutomated
        }
    }
}

/// Scoring outcome for one session
#[derive(Debug, Clone, Serialize)]
pub struct VerdictReport {
    pub session_id: String,
    pub producer: String,
    pub version: String,
    pub computed_at: DateTime<Utc>,
    pub stroke_count: u32,
    /// Per-algorithm results in registration order
    pub results: Evaluation,
    /// Confidence-weighted risk, or -1 for no verdict
    pub combined_score: f64,
    pub verdict: Verdict,
}

impl VerdictReport {
    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string(self).map_err(|e| CaptureError::EncodingError(e.to_string()))
    }
}

/// Replay a capture log and score it with the built-in algorithms (stateless, one-shot).
///
/// # Arguments
/// * `log_json` - Capture log JSON (`inkcheck.capture_log.v1`)
///
/// # Returns
/// Verdict report JSON
pub fn capture_log_to_verdict(log_json: &str) -> Result<String, CaptureError> {
    CaptchaProcessor::new().process_log(log_json)
}

/// Score a session JSON document with the built-in algorithms (stateless, one-shot)
pub fn session_to_verdict(session_json: &str) -> Result<String, CaptureError> {
    CaptchaProcessor::new().process_session(session_json)
}

/// Processor holding an injected scoring engine.
///
/// Construct one per process (or per tenant) and reuse it; algorithms are
/// registered on the engine before it is handed in.
#[derive(Debug, Clone)]
pub struct CaptchaProcessor {
    engine: ScoringEngine,
    /// Logical canvas forced onto every replayed capture log
    canvas: Option<CanvasSize>,
}

impl Default for CaptchaProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptchaProcessor {
    /// Create a processor scoring with the built-in algorithms
    pub fn new() -> Self {
        Self::with_engine(default_engine())
    }

    /// Create a processor around a caller-configured engine
    pub fn with_engine(engine: ScoringEngine) -> Self {
        Self {
            engine,
            canvas: None,
        }
    }

    /// Replay capture logs into this logical canvas instead of the one they declare
    pub fn with_canvas(mut self, canvas: CanvasSize) -> Self {
        self.canvas = Some(canvas);
        self
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ScoringEngine {
        &mut self.engine
    }

    /// Replay a capture log JSON document into a session
    pub fn build_session(&self, log_json: &str) -> Result<CaptchaSession, CaptureError> {
        let mut log = CaptureLog::from_json(log_json)?;
        if let Some(canvas) = self.canvas {
            log.canvas = canvas;
        }
        replay_capture_log(&log)
    }

    /// Score a session
    pub fn score(&self, session: &CaptchaSession) -> VerdictReport {
        let results = self.engine.evaluate(session);
        let combined_score = results.combined_score();

        VerdictReport {
            session_id: session.session_id.clone(),
            producer: PRODUCER_NAME.to_string(),
            version: INKCHECK_VERSION.to_string(),
            computed_at: Utc::now(),
            stroke_count: session.stroke_count,
            results,
            combined_score,
            verdict: Verdict::from_score(combined_score),
        }
    }

    /// Replay and score a capture log, returning verdict JSON
    pub fn process_log(&self, log_json: &str) -> Result<String, CaptureError> {
        let session = self.build_session(log_json)?;
        self.score(&session).to_json()
    }

    /// Score a session JSON document, returning verdict JSON
    pub fn process_session(&self, session_json: &str) -> Result<String, CaptureError> {
        let session = parse_session(session_json)?;
        self.score(&session).to_json()
    }
}
