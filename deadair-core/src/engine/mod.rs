//! `DeadAirEngine`: fetch, analyze and persist one call at a time.
//!
//! ## Flow
//!
//! ```text
//! DeadAirEngine::evaluate(id)
//!     ├─► AudioSource::fetch_audio      → SourceUnavailable on failure
//!     ├─► AudioSource::human_grade      → read before composing
//!     ├─► pipeline::analyze_bytes       → decode, detect, classify, compose
//!     └─► EvaluationStore::save         → idempotent unless reprocess
//! ```
//!
//! A failed save never discards the analysis: the caller gets the result back
//! with the save flagged as failed.
//!
//! ## Threading
//!
//! The engine holds no per-call state. Share it behind an `Arc` and call
//! `evaluate` from as many threads as needed; see [`batch::BatchRunner`].

pub mod batch;
pub mod pipeline;

use std::sync::{atomic::Ordering, Arc};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{DeadAirError, Result},
    evaluation::{AnalysisParameters, EvaluationResult},
    silence::{DEFAULT_MIN_SILENCE_SECONDS, DEFAULT_WINDOW_MS},
    store::{AudioSource, EvaluationStore, SaveOutcome, SaveReason},
};

pub use batch::{BatchReport, BatchRunner, BatchSummary, CallReport};
pub use pipeline::{DiagnosticsSnapshot, PipelineDiagnostics};

/// Configuration for `DeadAirEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Threshold, skips and loudness floor applied to every call.
    pub parameters: AnalysisParameters,
    /// Replace existing evaluations instead of skipping them. Default: false.
    pub reprocess: bool,
    /// Loudness window length in milliseconds. Default: 10.
    pub window_ms: u32,
    /// Shortest silent run the detector reports, in seconds. Default: 0.5.
    ///
    /// Never allowed to exceed `parameters.threshold_seconds`; see
    /// [`EngineConfig::detector_floor`].
    pub detector_min_silence_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parameters: AnalysisParameters::default(),
            reprocess: false,
            window_ms: DEFAULT_WINDOW_MS,
            detector_min_silence_seconds: DEFAULT_MIN_SILENCE_SECONDS,
        }
    }
}

impl EngineConfig {
    /// Detector floor actually used: `min(detector_min_silence_seconds, threshold)`.
    ///
    /// A floor above the threshold would hide gaps the classifier should see.
    pub fn detector_floor(&self) -> f64 {
        self.detector_min_silence_seconds
            .max(0.0)
            .min(self.parameters.threshold_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        self.parameters.validate()?;
        if self.window_ms == 0 {
            return Err(DeadAirError::InvalidParameters(
                "window_ms must be at least 1".into(),
            ));
        }
        if !self.detector_min_silence_seconds.is_finite() {
            return Err(DeadAirError::InvalidParameters(
                "detector_min_silence_seconds must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// What happened to the result on its way to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveStatus {
    Saved(SaveOutcome),
    Failed { error: String },
}

impl SaveStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SaveStatus::Failed { .. })
    }

    /// `true` when the store now holds this exact result.
    pub fn was_written(&self) -> bool {
        matches!(self, SaveStatus::Saved(outcome) if outcome.saved)
    }
}

/// Result of evaluating one call through the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub result: EvaluationResult,
    pub save: SaveStatus,
}

/// The top-level engine handle.
///
/// `DeadAirEngine` is `Send + Sync`; collaborators are shared trait objects.
pub struct DeadAirEngine {
    config: EngineConfig,
    source: Arc<dyn AudioSource>,
    store: Arc<dyn EvaluationStore>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl DeadAirEngine {
    /// Create an engine. Fails if the configuration is rejected.
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn AudioSource>,
        store: Arc<dyn EvaluationStore>,
    ) -> Result<Self> {
        config.validate()?;
        if config.detector_min_silence_seconds > config.parameters.threshold_seconds {
            warn!(
                requested = config.detector_min_silence_seconds,
                threshold = config.parameters.threshold_seconds,
                "detector floor exceeds gap threshold; clamping to threshold"
            );
        }
        info!(
            threshold = config.parameters.threshold_seconds,
            skip_start = config.parameters.skip_start_seconds,
            skip_end = config.parameters.skip_end_seconds,
            min_amplitude_dbfs = config.parameters.min_amplitude_dbfs,
            reprocess = config.reprocess,
            "dead-air engine ready"
        );
        Ok(Self {
            config,
            source,
            store,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Analyze a payload without touching the source or the store.
    pub fn analyze(
        &self,
        audio_identifier: &str,
        bytes: &[u8],
        human_grade: Option<&str>,
    ) -> Result<EvaluationResult> {
        let result = pipeline::analyze_bytes(audio_identifier, bytes, &self.config, human_grade);
        self.record_analysis(&result);
        result
    }

    /// Fetch, analyze and persist one call.
    ///
    /// # Errors
    /// `SourceUnavailable`, `Decode` or `InvalidParameters`. Persistence
    /// failures are not errors here; they come back as [`SaveStatus::Failed`].
    pub fn evaluate(&self, audio_identifier: &str) -> Result<CallOutcome> {
        self.config.parameters.validate()?;

        let fetched = self
            .source
            .fetch_audio(audio_identifier)
            .and_then(|bytes| Ok((bytes, self.source.human_grade(audio_identifier)?)));
        let (bytes, human_grade) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.diagnostics.source_errors.fetch_add(1, Ordering::Relaxed);
                warn!(audio_identifier, error = %e, "audio source failed");
                return Err(e);
            }
        };

        let result = self.analyze(audio_identifier, &bytes, human_grade.as_deref())?;
        let save = self.persist(&result);

        info!(
            audio_identifier,
            grade = %result.ai_grade,
            gaps = result.gap_count,
            dead_air = result.total_dead_air_seconds,
            written = save.was_written(),
            "call evaluated"
        );
        Ok(CallOutcome { result, save })
    }

    fn persist(&self, result: &EvaluationResult) -> SaveStatus {
        match self.store.save(result, self.config.reprocess) {
            Ok(outcome) => {
                let counter = match outcome.reason {
                    SaveReason::AlreadyEvaluated => &self.diagnostics.saves_skipped,
                    SaveReason::Inserted | SaveReason::Replaced => &self.diagnostics.saves_written,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                SaveStatus::Saved(outcome)
            }
            Err(e) => {
                self.diagnostics.save_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    audio_identifier = %result.audio_identifier,
                    error = %e,
                    "failed to persist evaluation"
                );
                SaveStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn record_analysis(&self, result: &Result<EvaluationResult>) {
        match result {
            Ok(r) => {
                self.diagnostics.calls_analyzed.fetch_add(1, Ordering::Relaxed);
                self.diagnostics
                    .gaps_found
                    .fetch_add(r.gap_count, Ordering::Relaxed);
            }
            Err(DeadAirError::Decode(_)) => {
                self.diagnostics.decode_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_floor_never_exceeds_threshold() {
        let mut config = EngineConfig::default();
        assert_eq!(config.detector_floor(), 0.5);

        config.parameters.threshold_seconds = 0.2;
        assert_eq!(config.detector_floor(), 0.2);
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = EngineConfig {
            window_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DeadAirError::InvalidParameters(_))
        ));
    }

    #[test]
    fn save_status_flags() {
        assert!(SaveStatus::Saved(SaveOutcome::inserted()).was_written());
        assert!(!SaveStatus::Saved(SaveOutcome::already_evaluated()).was_written());
        assert!(SaveStatus::Failed {
            error: "disk full".into()
        }
        .is_failed());
    }
}
