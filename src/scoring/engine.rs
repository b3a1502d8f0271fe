//! Scoring algorithm registry

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ScoringError;
use crate::scoring::ScoringAlgorithm;
use crate::types::{CaptchaSession, ScoringResult, SENTINEL_SCORE};

/// Ordered registry of scoring algorithms.
///
/// Duplicate names are allowed and coexist; `unregister` removes every
/// algorithm with the given name. Evaluation only needs `&self`, so one engine
/// can score many sessions concurrently.
#[derive(Clone, Default)]
pub struct ScoringEngine {
    algorithms: Vec<Arc<dyn ScoringAlgorithm>>,
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("algorithms", &self.names())
            .finish()
    }
}

impl ScoringEngine {
    /// Create an engine with no algorithms
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A: ScoringAlgorithm + 'static>(&mut self, algorithm: A) {
        self.register_shared(Arc::new(algorithm));
    }

    /// Register an algorithm instance that is shared with other engines
    pub fn register_shared(&mut self, algorithm: Arc<dyn ScoringAlgorithm>) {
        log::debug!(
            "registered scoring algorithm {} v{}",
            algorithm.name(),
            algorithm.version()
        );
        self.algorithms.push(algorithm);
    }

    /// Remove every algorithm registered under `name`; returns how many were removed
    pub fn unregister(&mut self, name: &str) -> usize {
        let before = self.algorithms.len();
        self.algorithms.retain(|a| a.name() != name);
        let removed = before - self.algorithms.len();
        if removed > 0 {
            log::debug!("unregistered {} scoring algorithm(s) named {}", removed, name);
        }
        removed
    }

    /// Registered names in registration order (duplicates included)
    pub fn names(&self) -> Vec<&str> {
        self.algorithms.iter().map(|a| a.name()).collect()
    }

    /// `(name, version)` of each registered algorithm
    pub fn algorithms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.algorithms.iter().map(|a| (a.name(), a.version()))
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    /// Run every registered algorithm against the session.
    ///
    /// A failing algorithm contributes a sentinel result (score -1,
    /// confidence 0) and is reported to the log; the others still run.
    pub fn evaluate(&self, session: &CaptchaSession) -> Evaluation {
        let mut evaluation = Evaluation::default();
        for algorithm in &self.algorithms {
            let result = run_isolated(algorithm.as_ref(), session);
            evaluation.insert(algorithm.name().to_string(), result);
        }
        evaluation
    }

    /// Confidence-weighted mean of the non-sentinel results, or -1 when no
    /// algorithm produced a usable opinion
    pub fn combined_score(&self, session: &CaptchaSession) -> f64 {
        combine(&self.evaluate(session))
    }
}

/// `Σ(score × confidence) / Σ(confidence)` over results with `score >= 0`.
///
/// Returns -1 when the evaluation is empty or the total weight is zero, so
/// "no signal" is never confused with "zero risk".
pub fn combine(evaluation: &Evaluation) -> f64 {
    let (weighted, total_weight) = evaluation
        .iter()
        .filter(|(_, r)| r.score >= 0.0)
        .fold((0.0, 0.0), |(weighted, total), (_, r)| {
            (weighted + r.score * r.confidence, total + r.confidence)
        });

    if total_weight > 0.0 {
        weighted / total_weight
    } else {
        SENTINEL_SCORE
    }
}

fn run_isolated(algorithm: &dyn ScoringAlgorithm, session: &CaptchaSession) -> ScoringResult {
    let name = algorithm.name();
    let version = algorithm.version();

    match catch_unwind(AssertUnwindSafe(|| algorithm.score(session))) {
        Ok(Ok(result)) if result.is_well_formed() => result,
        Ok(Ok(result)) => {
            log::error!(
                "scoring algorithm {} v{} returned out-of-range result (score {}, confidence {})",
                name,
                version,
                result.score,
                result.confidence
            );
            ScoringResult::sentinel(format!("{} returned an out-of-range result", name))
        }
        Ok(Err(err)) => {
            match &err {
                ScoringError::NotImplemented | ScoringError::InsufficientData(_) => {
                    log::warn!("scoring algorithm {} v{} skipped: {}", name, version, err);
                }
                ScoringError::Failed(_) => {
                    log::error!("scoring algorithm {} v{} failed: {}", name, version, err);
                }
            }
            ScoringResult::sentinel(format!("{} failed: {}", name, err))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            log::error!("scoring algorithm {} v{} panicked: {}", name, version, message);
            ScoringResult::sentinel(format!("{} panicked: {}", name, message))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Results of one evaluation, keyed by algorithm name in registration order.
///
/// When several algorithms share a name the entry keeps the position of the
/// first one and holds the result of the last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    entries: Vec<(String, ScoringResult)>,
}

impl Evaluation {
    fn insert(&mut self, name: String, result: ScoringResult) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = result,
            None => self.entries.push((name, result)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScoringResult> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScoringResult)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn combined_score(&self) -> f64 {
        combine(self)
    }
}

impl Serialize for Evaluation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, result) in &self.entries {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}
