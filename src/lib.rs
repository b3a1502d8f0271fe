//! inkcheck - Pointer-motion capture and risk scoring for drawing challenges
//!
//! inkcheck turns the pointer input of a drawing challenge into behavioral
//! evidence through a one-way pipeline: capture normalization → per-stroke
//! kinematics → session aggregation → pluggable risk scoring.
//!
//! ## Modules
//!
//! - **Capture**: normalize raw pointer events and record strokes
//! - **Metrics**: velocity, acceleration and direction changes per stroke
//! - **Session**: aggregate strokes into an immutable session record
//! - **Scoring**: registry of independent scoring algorithms and score combination

pub mod capture;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod scoring;
pub mod session;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use capture::{CaptureLog, CapturePointNormalizer, CaptureSurface, RawPointerEvent, StrokeRecorder};
pub use error::{CaptureError, ScoringError};
pub use metrics::compute_stroke_metrics;
pub use pipeline::{capture_log_to_verdict, session_to_verdict, CaptchaProcessor, Verdict, VerdictReport};
pub use scoring::{default_engine, Evaluation, ScoringAlgorithm, ScoringEngine};
pub use session::{build_session, SessionTiming};
pub use types::{
    CanvasSize, CaptchaSession, CapturePoint, PointerType, ScoringResult, Stroke, StrokeMetrics,
};

/// inkcheck version embedded in every verdict report
pub const INKCHECK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for verdict reports
pub const PRODUCER_NAME: &str = "inkcheck";
