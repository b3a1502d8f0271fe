//! Error types for inkcheck

use thiserror::Error;

/// Errors that can occur while capturing, aggregating or encoding sessions
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to parse capture payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid capture surface: {0}")]
    InvalidSurface(String),

    #[error("Invalid pointer event: {0}")]
    InvalidEvent(String),

    #[error("Invalid captcha session: {0}")]
    InvalidSession(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Errors a scoring algorithm may return from `score`.
///
/// The engine converts every one of these into a sentinel result; they never
/// reach the caller of `evaluate`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Algorithm not implemented")]
    NotImplemented,

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Scoring failed: {0}")]
    Failed(String),
}
