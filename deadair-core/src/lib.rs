//! # deadair-core
//!
//! Dead-air detection and grading for recorded call audio.
//!
//! ## Architecture
//!
//! ```text
//! AudioSource::fetch_audio → decode → AudioBuffer
//!                                         │
//!                               SilenceDetector (RMS dBFS, 10 ms)
//!                                         │
//!                           EvaluationBoundaries + classify → Vec<Gap>
//!                                         │
//!                                compose → EvaluationResult
//!                                         │
//!                               EvaluationStore::save (idempotent)
//! ```
//!
//! Analysis is pure and synchronous. Hosts provide the source and the store;
//! [`engine::BatchRunner`] fans calls out over a fixed pool of workers.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod gaps;
pub mod silence;
pub mod store;

// Convenience re-exports for downstream crates
pub use audio::AudioBuffer;
pub use engine::{
    BatchReport, BatchRunner, BatchSummary, CallOutcome, DeadAirEngine, EngineConfig, SaveStatus,
};
pub use error::{DeadAirError, Result};
pub use evaluation::{
    report::{explanation, format_timestamp},
    stats::EvaluationStatistics,
    AnalysisParameters, EvaluationResult, Grade, AUDIO_ANALYSIS_CONTEXT,
};
pub use gaps::{EvaluationBoundaries, Gap};
pub use silence::{SilenceDetector, SilenceInterval};
pub use store::{AudioSource, EvaluationStore, SaveOutcome, SaveReason};
