//! Collaborator seams: where audio comes from and where evaluations go.
//!
//! The engine only ever talks to these traits, so the host decides whether
//! the backing store is SQLite, a remote database or [`memory`] for tests.

pub mod memory;

pub use memory::{MemoryAudioSource, MemoryEvaluationStore};

use serde::Serialize;

use crate::error::{DeadAirError, Result};
use crate::evaluation::{EvaluationResult, AUDIO_ANALYSIS_CONTEXT};

/// Supplies raw audio and any human grade for a call.
pub trait AudioSource: Send + Sync {
    /// Complete audio payload for `id`.
    ///
    /// Fails with `SourceUnavailable` when the call is unknown or the backend
    /// cannot be reached.
    fn fetch_audio(&self, id: &str) -> Result<Vec<u8>>;

    /// Human-assigned grade for `id`, if one was recorded.
    fn human_grade(&self, id: &str) -> Result<Option<String>>;
}

/// Why a save did or did not write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveReason {
    Inserted,
    Replaced,
    #[serde(rename = "already evaluated")]
    AlreadyEvaluated,
}

impl SaveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SaveReason::Inserted => "inserted",
            SaveReason::Replaced => "replaced",
            SaveReason::AlreadyEvaluated => "already evaluated",
        }
    }
}

/// Result of [`EvaluationStore::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub saved: bool,
    pub reason: SaveReason,
}

impl SaveOutcome {
    pub fn inserted() -> Self {
        Self {
            saved: true,
            reason: SaveReason::Inserted,
        }
    }

    pub fn replaced() -> Self {
        Self {
            saved: true,
            reason: SaveReason::Replaced,
        }
    }

    pub fn already_evaluated() -> Self {
        Self {
            saved: false,
            reason: SaveReason::AlreadyEvaluated,
        }
    }
}

/// Idempotent persistence of evaluations keyed by `(audio_identifier, context)`.
///
/// Implementations must make the existence check and the write atomic, and
/// must be safe for concurrent writers on different keys.
pub trait EvaluationStore: Send + Sync {
    /// Insert `result`, or replace the existing record when `reprocess` is set.
    ///
    /// Without `reprocess`, an existing record is left untouched and the
    /// outcome reports `saved = false`.
    ///
    /// # Errors
    /// `Persistence` on backend failure; `InvalidParameters` when the result
    /// is not tagged with the engine context.
    fn save(&self, result: &EvaluationResult, reprocess: bool) -> Result<SaveOutcome>;

    fn load(&self, audio_identifier: &str, context: &str) -> Result<Option<EvaluationResult>>;

    /// All records stored under `context`, ordered by identifier.
    fn list(&self, context: &str) -> Result<Vec<EvaluationResult>>;
}

/// Only engine-produced records may be written; everything else is read-only.
pub fn ensure_engine_context(result: &EvaluationResult) -> Result<()> {
    if result.context == AUDIO_ANALYSIS_CONTEXT {
        Ok(())
    } else {
        Err(DeadAirError::InvalidParameters(format!(
            "refusing to write evaluation under foreign context {:?}",
            result.context
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_reason_serialises_like_as_str() {
        for reason in [
            SaveReason::Inserted,
            SaveReason::Replaced,
            SaveReason::AlreadyEvaluated,
        ] {
            assert_eq!(serde_json::to_value(reason).unwrap(), reason.as_str());
        }
        let json = serde_json::to_value(SaveOutcome::already_evaluated()).unwrap();
        assert_eq!(json["reason"], "already evaluated");
        assert_eq!(json["saved"], false);
    }
}
