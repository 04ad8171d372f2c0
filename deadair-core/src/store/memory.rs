//! In-process implementations of the collaborator traits.
//!
//! Used by the test-suite and by hosts that only need a single run's results.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::{ensure_engine_context, AudioSource, EvaluationStore, SaveOutcome};
use crate::error::{DeadAirError, Result};
use crate::evaluation::EvaluationResult;

#[derive(Debug, Clone)]
struct StoredCall {
    audio: Vec<u8>,
    human_grade: Option<String>,
}

/// Audio source backed by a map of identifier → payload.
#[derive(Debug, Default)]
pub struct MemoryAudioSource {
    calls: Mutex<HashMap<String, StoredCall>>,
}

impl MemoryAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, audio: Vec<u8>, human_grade: Option<&str>) {
        self.calls.lock().insert(
            id.into(),
            StoredCall {
                audio,
                human_grade: human_grade.map(str::to_string),
            },
        );
    }
}

impl AudioSource for MemoryAudioSource {
    fn fetch_audio(&self, id: &str) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .get(id)
            .map(|call| call.audio.clone())
            .ok_or_else(|| DeadAirError::source_unavailable(id, "no such call"))
    }

    fn human_grade(&self, id: &str) -> Result<Option<String>> {
        self.calls
            .lock()
            .get(id)
            .map(|call| call.human_grade.clone())
            .ok_or_else(|| DeadAirError::source_unavailable(id, "no such call"))
    }
}

/// Evaluation store held in a mutex-guarded map.
///
/// The lock spans the existence check and the write, so saves are atomic.
#[derive(Debug, Default)]
pub struct MemoryEvaluationStore {
    records: Mutex<BTreeMap<(String, String), EvaluationResult>>,
}

impl MemoryEvaluationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a record written by some other party (e.g. a human reviewer).
    ///
    /// Bypasses the engine-context guard; the engine itself never calls this.
    pub fn insert_external(&self, record: EvaluationResult) {
        let key = (record.audio_identifier.clone(), record.context.clone());
        self.records.lock().insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl EvaluationStore for MemoryEvaluationStore {
    fn save(&self, result: &EvaluationResult, reprocess: bool) -> Result<SaveOutcome> {
        ensure_engine_context(result)?;
        let key = (result.audio_identifier.clone(), result.context.clone());

        let mut records = self.records.lock();
        let existed = records.contains_key(&key);
        if existed && !reprocess {
            return Ok(SaveOutcome::already_evaluated());
        }
        records.insert(key, result.clone());
        Ok(if existed {
            SaveOutcome::replaced()
        } else {
            SaveOutcome::inserted()
        })
    }

    fn load(&self, audio_identifier: &str, context: &str) -> Result<Option<EvaluationResult>> {
        Ok(self
            .records
            .lock()
            .get(&(audio_identifier.to_string(), context.to_string()))
            .cloned())
    }

    fn list(&self, context: &str) -> Result<Vec<EvaluationResult>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|((_, ctx), _)| ctx == context)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
