//! Human-readable rendering of an [`EvaluationResult`].
//!
//! Durations are shown with one decimal and positions as `[MM:SS]`. These are
//! presentation choices only; the stored record keeps full precision.

use super::EvaluationResult;

/// Gaps listed individually in an explanation before summarising the rest.
const EXPLAINED_GAPS: usize = 4;

/// Format a position in the call as `[MM:SS]`.
pub fn format_timestamp(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    format!("[{:02}:{:02}]", whole / 60, whole % 60)
}

/// One-paragraph explanation of why a call passed or failed.
pub fn explanation(result: &EvaluationResult) -> String {
    let threshold = result.parameters.threshold_seconds;
    if result.found_references.is_empty() {
        return format!(
            "No dead air gaps exceeding {threshold} seconds found in the evaluated portion of the call."
        );
    }

    let listed: Vec<String> = result
        .found_references
        .iter()
        .take(EXPLAINED_GAPS)
        .map(|gap| {
            format!(
                "{} to {} ({:.1}s)",
                format_timestamp(gap.start_time),
                format_timestamp(gap.end_time),
                gap.duration
            )
        })
        .collect();

    let mut text = format!(
        "Found {} dead air gap(s) totaling {:.1}s. Gaps: {}",
        result.gap_count,
        result.total_dead_air_seconds,
        listed.join("; ")
    );
    if result.gap_count > EXPLAINED_GAPS {
        text.push_str(&format!("; ... and {} more", result.gap_count - EXPLAINED_GAPS));
    }
    text
}

/// Short improvement hint for failed calls.
pub fn improvement_suggestion(result: &EvaluationResult) -> Option<&'static str> {
    (!result.passed)
        .then_some("Reduce silence periods between utterances to maintain call flow and engagement.")
}
