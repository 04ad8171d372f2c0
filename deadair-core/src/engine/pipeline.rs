//! Single-call analysis pipeline.
//!
//! ## Stages
//!
//! ```text
//! 1. Validate parameters (before any audio work)
//! 2. Decode bytes → AudioBuffer
//! 3. Detect silence → Vec<SilenceInterval>
//! 4. Derive evaluation boundaries, classify → Vec<Gap>
//! 5. Compose EvaluationResult (with the human grade, if any)
//! ```
//!
//! Everything here is synchronous and free of I/O; fetching and saving are
//! done by [`super::DeadAirEngine`].

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::{
    audio::{self, AudioBuffer},
    engine::EngineConfig,
    error::Result,
    evaluation::{compose, EvaluationResult},
    gaps::{classify, EvaluationBoundaries},
    silence::SilenceDetector,
};

/// Running counters across every call an engine has handled.
#[derive(Debug, Default)]
pub struct PipelineDiagnostics {
    pub calls_analyzed: AtomicUsize,
    pub gaps_found: AtomicUsize,
    pub source_errors: AtomicUsize,
    pub decode_errors: AtomicUsize,
    pub saves_written: AtomicUsize,
    pub saves_skipped: AtomicUsize,
    pub save_failures: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.calls_analyzed.store(0, Ordering::Relaxed);
        self.gaps_found.store(0, Ordering::Relaxed);
        self.source_errors.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.saves_written.store(0, Ordering::Relaxed);
        self.saves_skipped.store(0, Ordering::Relaxed);
        self.save_failures.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            calls_analyzed: self.calls_analyzed.load(Ordering::Relaxed),
            gaps_found: self.gaps_found.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            saves_written: self.saves_written.load(Ordering::Relaxed),
            saves_skipped: self.saves_skipped.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub calls_analyzed: usize,
    pub gaps_found: usize,
    pub source_errors: usize,
    pub decode_errors: usize,
    pub saves_written: usize,
    pub saves_skipped: usize,
    pub save_failures: usize,
}

/// Run detection, classification and composition over a decoded buffer.
///
/// # Errors
/// `InvalidParameters` if the configured parameters are rejected.
pub fn analyze_buffer(
    audio_identifier: &str,
    buffer: &AudioBuffer,
    config: &EngineConfig,
    human_grade: Option<&str>,
) -> Result<EvaluationResult> {
    let params = config.parameters;
    params.validate()?;

    let detector = SilenceDetector::new(params.min_amplitude_dbfs, config.detector_floor())
        .with_window_ms(config.window_ms);
    let intervals = detector.detect(buffer);

    let duration = buffer.duration_seconds();
    let boundaries =
        EvaluationBoundaries::derive(duration, params.skip_start_seconds, params.skip_end_seconds)?;
    let gaps = classify(&intervals, boundaries, params.threshold_seconds)?;

    debug!(
        audio_identifier,
        duration,
        silence_intervals = intervals.len(),
        gaps = gaps.len(),
        window_start = boundaries.start_time,
        window_end = boundaries.end_time,
        "call analyzed"
    );

    Ok(compose(
        audio_identifier,
        gaps,
        duration,
        boundaries,
        params,
        human_grade,
    ))
}

/// Decode a payload and analyze it.
///
/// Parameters are validated before decoding so bad input never costs a decode.
///
/// # Errors
/// `InvalidParameters` or `Decode`.
pub fn analyze_bytes(
    audio_identifier: &str,
    bytes: &[u8],
    config: &EngineConfig,
    human_grade: Option<&str>,
) -> Result<EvaluationResult> {
    config.parameters.validate()?;
    let buffer = audio::decode(bytes)?;
    analyze_buffer(audio_identifier, &buffer, config, human_grade)
}
