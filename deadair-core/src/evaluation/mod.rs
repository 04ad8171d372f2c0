//! Evaluation records and the composer that builds them.
//!
//! [`compose`] is a pure transform: gaps + metadata in, [`EvaluationResult`]
//! out. Persistence lives behind [`crate::store::EvaluationStore`].

pub mod report;
pub mod stats;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DeadAirError, Result};
use crate::gaps::{total_duration, EvaluationBoundaries, Gap};

/// Context tag under which this engine writes its evaluations.
pub const AUDIO_ANALYSIS_CONTEXT: &str = "audio_analysis";

/// Verdict of the deterministic dead-air rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    Passed,
    Failed,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Passed => "PASSED",
            Grade::Failed => "FAILED",
        }
    }

    /// Case-insensitive exact comparison against a grade string.
    pub fn matches(self, other: &str) -> bool {
        other.eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = DeadAirError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if Grade::Passed.matches(s) {
            Ok(Grade::Passed)
        } else if Grade::Failed.matches(s) {
            Ok(Grade::Failed)
        } else {
            Err(DeadAirError::InvalidParameters(format!("unknown grade: {s:?}")))
        }
    }
}

/// The four tunables of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParameters {
    /// Shortest silence (seconds) that counts as dead air.
    pub threshold_seconds: f64,
    /// Lead-in excluded from evaluation (seconds).
    pub skip_start_seconds: f64,
    /// Lead-out excluded from evaluation (seconds).
    pub skip_end_seconds: f64,
    /// Windows at or below this loudness are silent (dBFS, <= 0).
    pub min_amplitude_dbfs: f64,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            threshold_seconds: 3.0,
            skip_start_seconds: 10.0,
            skip_end_seconds: 10.0,
            min_amplitude_dbfs: -30.0,
        }
    }
}

impl AnalysisParameters {
    /// Reject parameter sets that cannot describe a meaningful run.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("threshold_seconds", self.threshold_seconds),
            ("skip_start_seconds", self.skip_start_seconds),
            ("skip_end_seconds", self.skip_end_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DeadAirError::InvalidParameters(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !self.min_amplitude_dbfs.is_finite() || self.min_amplitude_dbfs > 0.0 {
            return Err(DeadAirError::InvalidParameters(format!(
                "min_amplitude_dbfs must be a finite value <= 0, got {}",
                self.min_amplitude_dbfs
            )));
        }
        Ok(())
    }
}

/// One call's dead-air evaluation. The unit of persisted truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub audio_identifier: String,
    pub context: String,
    pub parameters: AnalysisParameters,
    pub gap_count: usize,
    pub total_dead_air_seconds: f64,
    pub audio_duration: f64,
    pub evaluation_boundaries: EvaluationBoundaries,
    /// Gaps ascending by start time.
    pub found_references: Vec<Gap>,
    pub ai_grade: Grade,
    pub human_grade: Option<String>,
    pub passed: bool,
    /// `None` when no human grade exists to compare against.
    #[serde(rename = "match")]
    pub grade_match: Option<bool>,
}

/// Aggregate gaps into an evaluation and reconcile it with a human grade.
///
/// A single gap fails the call. `grade_match` is only set when a non-blank
/// human grade is supplied.
pub fn compose(
    audio_identifier: &str,
    gaps: Vec<Gap>,
    audio_duration: f64,
    boundaries: EvaluationBoundaries,
    parameters: AnalysisParameters,
    existing_human_grade: Option<&str>,
) -> EvaluationResult {
    let ai_grade = if gaps.is_empty() {
        Grade::Passed
    } else {
        Grade::Failed
    };
    let human_grade = existing_human_grade
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string);
    let grade_match = human_grade.as_deref().map(|h| ai_grade.matches(h));

    EvaluationResult {
        audio_identifier: audio_identifier.to_string(),
        context: AUDIO_ANALYSIS_CONTEXT.to_string(),
        parameters,
        gap_count: gaps.len(),
        total_dead_air_seconds: total_duration(&gaps),
        audio_duration,
        evaluation_boundaries: boundaries,
        found_references: gaps,
        ai_grade,
        human_grade,
        passed: ai_grade == Grade::Passed,
        grade_match,
    }
}
