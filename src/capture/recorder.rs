//! Stroke recording
//!
//! Drives the pointer lifecycle for one challenge attempt: pointer-down opens
//! a stroke, pointer-move appends points, pointer-up / cancel / leave
//! finalizes it. Every call is synchronous and does only the work for the
//! event at hand.

use chrono::{DateTime, Utc};

use crate::capture::event::{CaptureLog, PointerEventKind, RawPointerEvent};
use crate::capture::normalizer::CapturePointNormalizer;
use crate::error::CaptureError;
use crate::session::{build_session, SessionTiming};
use crate::types::{CaptchaSession, CapturePoint, Stroke};

/// Records strokes for one challenge attempt
#[derive(Debug, Clone)]
pub struct StrokeRecorder {
    normalizer: CapturePointNormalizer,
    strokes: Vec<Stroke>,
    active: Option<Vec<CapturePoint>>,
    next_stroke_id: u32,
    start_time: f64,
    started_at: DateTime<Utc>,
}

impl StrokeRecorder {
    /// Start recording.
    ///
    /// `start_time` is the monotonic time (ms) the challenge became
    /// interactive; the wall-clock start is taken now.
    pub fn new(normalizer: CapturePointNormalizer, start_time: f64) -> Self {
        Self::with_started_at(normalizer, start_time, Utc::now())
    }

    pub fn with_started_at(
        normalizer: CapturePointNormalizer,
        start_time: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            normalizer,
            strokes: Vec::new(),
            active: None,
            next_stroke_id: 0,
            start_time,
            started_at,
        }
    }

    pub fn normalizer_mut(&mut self) -> &mut CapturePointNormalizer {
        &mut self.normalizer
    }

    /// Finalized strokes so far
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Whether a contact is currently in progress
    pub fn is_drawing(&self) -> bool {
        self.active.is_some()
    }

    /// Dispatch an event by its lifecycle phase
    pub fn handle(&mut self, event: &RawPointerEvent) {
        match event.kind {
            PointerEventKind::Down => self.pointer_down(event),
            PointerEventKind::Move => self.pointer_move(event),
            PointerEventKind::Up => self.pointer_up(event),
            PointerEventKind::Cancel => self.pointer_cancel(event),
            PointerEventKind::Leave => self.pointer_leave(event),
        }
    }

    /// Begin a stroke. A stroke still open from a lost pointer-up is finalized first.
    pub fn pointer_down(&mut self, event: &RawPointerEvent) {
        if self.active.is_some() {
            self.finalize_active();
        }
        self.active = Some(self.normalizer.normalize(event));
    }

    /// Append every sample the event carries. Hover moves are ignored.
    pub fn pointer_move(&mut self, event: &RawPointerEvent) {
        let points = self.normalizer.normalize(event);
        if let Some(active) = self.active.as_mut() {
            active.extend(points);
        }
    }

    pub fn pointer_up(&mut self, _event: &RawPointerEvent) {
        self.finalize_active();
    }

    /// Aborted contact; handled exactly like pointer-up
    pub fn pointer_cancel(&mut self, _event: &RawPointerEvent) {
        self.finalize_active();
    }

    pub fn pointer_leave(&mut self, _event: &RawPointerEvent) {
        self.finalize_active();
    }

    /// Drop every stroke and restart ids from 0
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.active = None;
        self.next_stroke_id = 0;
    }

    /// Finalize any open stroke and build the session record
    pub fn finish(mut self, prompt: impl Into<String>, end_time: f64) -> CaptchaSession {
        self.finalize_active();
        let timing = SessionTiming {
            start_time: self.start_time,
            end_time,
            started_at: self.started_at,
        };
        build_session(self.strokes, prompt, self.normalizer.canvas(), timing)
    }

    fn finalize_active(&mut self) {
        let Some(points) = self.active.take() else {
            return;
        };

        let point_count = points.len();
        match Stroke::from_points(self.next_stroke_id, points) {
            Some(stroke) => {
                self.strokes.push(stroke);
                self.next_stroke_id += 1;
            }
            None => log::debug!(
                "discarded stroke with {} point(s) (too short or metrics overflow)",
                point_count
            ),
        }
    }
}

/// Replay a recorded capture log into a session.
///
/// The log header and every event are validated; the first failing event is
/// reported. Missing start/end times fall back to the first/last event time
/// stamps.
pub fn replay_capture_log(log: &CaptureLog) -> Result<CaptchaSession, CaptureError> {
    log.validate()?;
    if let Some(failure) = log.validate_events().into_iter().next() {
        return Err(CaptureError::InvalidEvent(format!(
            "event {}: {}",
            failure.index, failure.error
        )));
    }

    let first_event_time = log.events.first().map(|e| e.time_stamp).unwrap_or(0.0);
    let last_event_time = log.events.last().map(|e| e.time_stamp).unwrap_or(first_event_time);
    let start_time = log.start_time.unwrap_or(first_event_time);
    let end_time = log.end_time.unwrap_or(last_event_time);

    let normalizer = CapturePointNormalizer::new(log.surface, log.canvas)?;
    let mut recorder = match log.started_at {
        Some(started_at) => StrokeRecorder::with_started_at(normalizer, start_time, started_at),
        None => StrokeRecorder::new(normalizer, start_time),
    };

    for event in &log.events {
        recorder.handle(event);
    }

    Ok(recorder.finish(log.prompt.clone(), end_time))
}
