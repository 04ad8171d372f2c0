//! Maps raw silence intervals onto dead-air gaps.
//!
//! ## Steps
//!
//! 1. Clip each interval to the evaluation window; drop anything outside it.
//! 2. Merge intervals that overlap or touch exactly after clipping.
//! 3. Drop merged intervals shorter than the dead-air threshold.
//! 4. Return the survivors ascending by start time.

use serde::{Deserialize, Serialize};

use crate::error::{DeadAirError, Result};
use crate::silence::SilenceInterval;

/// The part of the call in which dead air counts.
///
/// Always satisfies `0 <= start_time <= end_time <= audio_duration`. When the
/// skip regions cover the whole call the window collapses to zero length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationBoundaries {
    pub start_time: f64,
    pub end_time: f64,
}

impl EvaluationBoundaries {
    /// Derive the window from lead-in / lead-out skips.
    ///
    /// # Errors
    /// `InvalidParameters` if a skip or the duration is negative or not finite.
    pub fn derive(
        audio_duration: f64,
        skip_start_seconds: f64,
        skip_end_seconds: f64,
    ) -> Result<Self> {
        for (name, value) in [
            ("audio_duration", audio_duration),
            ("skip_start_seconds", skip_start_seconds),
            ("skip_end_seconds", skip_end_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DeadAirError::InvalidParameters(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        let start_time = skip_start_seconds.min(audio_duration);
        let end_time = (audio_duration - skip_end_seconds).max(start_time);
        Ok(Self {
            start_time,
            end_time,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn is_empty(&self) -> bool {
        self.end_time <= self.start_time
    }
}

/// A silence interval that survived clipping, merging and the threshold gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

impl Gap {
    fn from_span(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time,
            duration: end_time - start_time,
        }
    }
}

/// Turn detector output into dead-air gaps.
///
/// # Errors
/// `InvalidParameters` for a negative or non-finite `threshold_seconds`.
pub fn classify(
    intervals: &[SilenceInterval],
    boundaries: EvaluationBoundaries,
    threshold_seconds: f64,
) -> Result<Vec<Gap>> {
    if !threshold_seconds.is_finite() || threshold_seconds < 0.0 {
        return Err(DeadAirError::InvalidParameters(format!(
            "threshold_seconds must be a non-negative number, got {threshold_seconds}"
        )));
    }
    if boundaries.is_empty() {
        return Ok(Vec::new());
    }

    let mut clipped: Vec<(f64, f64)> = intervals
        .iter()
        .filter_map(|iv| {
            let start = iv.start_seconds.max(boundaries.start_time);
            let end = iv.end_seconds.min(boundaries.end_time);
            (end > start).then_some((start, end))
        })
        .collect();
    clipped.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(clipped.len());
    for (start, end) in clipped {
        match merged.last_mut() {
            // Zero tolerance: only overlap or an exact touch merges.
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut gaps: Vec<Gap> = merged
        .into_iter()
        .map(|(start, end)| Gap::from_span(start, end))
        .filter(|gap| gap.duration >= threshold_seconds)
        .collect();
    gaps.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    Ok(gaps)
}

/// Sum of gap durations (not the first-to-last span).
pub fn total_duration(gaps: &[Gap]) -> f64 {
    gaps.iter().map(|g| g.duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn iv(start: f64, end: f64) -> SilenceInterval {
        SilenceInterval::new(start, end)
    }

    fn window(start: f64, end: f64) -> EvaluationBoundaries {
        EvaluationBoundaries {
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn boundaries_from_skips() {
        let b = EvaluationBoundaries::derive(60.0, 10.0, 10.0).unwrap();
        assert_eq!(b, window(10.0, 50.0));
    }

    #[test]
    fn boundaries_collapse_when_skips_cover_the_call() {
        let b = EvaluationBoundaries::derive(15.0, 10.0, 10.0).unwrap();
        assert!(b.is_empty());
        assert!(b.start_time <= b.end_time && b.end_time <= 15.0);

        let b = EvaluationBoundaries::derive(5.0, 10.0, 0.0).unwrap();
        assert_eq!(b, window(5.0, 5.0));
    }

    #[test]
    fn negative_skip_is_rejected() {
        assert!(matches!(
            EvaluationBoundaries::derive(60.0, -1.0, 10.0),
            Err(DeadAirError::InvalidParameters(_))
        ));
    }

    #[test]
    fn interval_inside_window_passes_through() {
        let gaps = classify(&[iv(20.0, 26.0)], window(10.0, 50.0), 3.0).unwrap();
        assert_eq!(gaps, vec![Gap::from_span(20.0, 26.0)]);
        assert_relative_eq!(gaps[0].duration, 6.0);
    }

    #[test]
    fn interval_outside_window_is_dropped() {
        let gaps = classify(&[iv(0.0, 8.0), iv(52.0, 60.0)], window(10.0, 50.0), 3.0).unwrap();
        assert!(gaps.is_empty());
    }

    #[test]
    fn partial_overlap_is_truncated_before_threshold() {
        // 7 s of silence, only 2 s of it inside the window.
        let gaps = classify(&[iv(5.0, 12.0)], window(10.0, 50.0), 3.0).unwrap();
        assert!(gaps.is_empty());

        let gaps = classify(&[iv(5.0, 14.0)], window(10.0, 50.0), 3.0).unwrap();
        assert_eq!(gaps, vec![Gap::from_span(10.0, 14.0)]);
    }

    #[test]
    fn touching_intervals_merge() {
        let gaps = classify(&[iv(20.0, 21.5), iv(21.5, 23.5)], window(0.0, 60.0), 3.0).unwrap();
        assert_eq!(gaps, vec![Gap::from_span(20.0, 23.5)]);
    }

    #[test]
    fn separated_intervals_do_not_merge() {
        let gaps = classify(&[iv(20.0, 22.0), iv(22.01, 24.0)], window(0.0, 60.0), 3.0).unwrap();
        assert!(gaps.is_empty());
    }

    #[test]
    fn output_is_sorted_and_disjoint() {
        let input = [iv(40.0, 45.0), iv(12.0, 16.0), iv(14.0, 19.0), iv(30.0, 30.5)];
        let gaps = classify(&input, window(10.0, 50.0), 3.0).unwrap();

        assert_eq!(
            gaps,
            vec![Gap::from_span(12.0, 19.0), Gap::from_span(40.0, 45.0)]
        );
        for pair in gaps.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let gaps = classify(&[iv(20.0, 23.0)], window(0.0, 60.0), 3.0).unwrap();
        assert_eq!(gaps.len(), 1);
    }

    #[test]
    fn empty_window_yields_no_gaps() {
        let gaps = classify(&[iv(0.0, 15.0)], window(7.5, 7.5), 0.0).unwrap();
        assert!(gaps.is_empty());
    }

    #[test]
    fn negative_threshold_is_rejected() {
        assert!(matches!(
            classify(&[], window(0.0, 10.0), -0.1),
            Err(DeadAirError::InvalidParameters(_))
        ));
    }

    #[test]
    fn total_is_sum_not_span() {
        let gaps = vec![Gap::from_span(10.0, 14.0), Gap::from_span(30.0, 33.0)];
        assert_relative_eq!(total_duration(&gaps), 7.0);
    }
}
