//! Pointer capture
//!
//! Turns raw pointer events into normalized points and finalized strokes.
//!
//! Pipeline: pointer events → normalizer → recorder → session

pub mod event;
pub mod normalizer;
pub mod recorder;

pub use event::{
    CaptureLog, CaptureSurface, PointerEventKind, PointerSample, RawPointerEvent,
    ValidationError, ValidationResult, CAPTURE_LOG_VERSION,
};
pub use normalizer::CapturePointNormalizer;
pub use recorder::{replay_capture_log, StrokeRecorder};
