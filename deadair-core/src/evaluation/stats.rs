//! Agreement between machine and human grades across stored evaluations.
//!
//! "Positive" means dead air was found, i.e. a `FAILED` grade.

use serde::{Deserialize, Serialize};

use super::{EvaluationResult, Grade};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStatistics {
    /// Evaluations that carry a recognisable human grade.
    pub total_comparisons: usize,
    pub matches: usize,
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Evaluations without a usable human grade.
    pub ungraded: usize,
    /// Share of comparisons that matched, in percent, two decimals.
    pub accuracy_percentage: f64,
}

impl EvaluationStatistics {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a EvaluationResult>,
    {
        let mut stats = Self::default();
        for result in results {
            let human = result
                .human_grade
                .as_deref()
                .and_then(|g| g.parse::<Grade>().ok());
            let Some(human) = human else {
                stats.ungraded += 1;
                continue;
            };

            stats.total_comparisons += 1;
            match (result.ai_grade, human) {
                (Grade::Failed, Grade::Failed) => stats.true_positives += 1,
                (Grade::Passed, Grade::Passed) => stats.true_negatives += 1,
                (Grade::Failed, Grade::Passed) => stats.false_positives += 1,
                (Grade::Passed, Grade::Failed) => stats.false_negatives += 1,
            }
        }

        stats.matches = stats.true_positives + stats.true_negatives;
        if stats.total_comparisons > 0 {
            let pct = stats.matches as f64 / stats.total_comparisons as f64 * 100.0;
            stats.accuracy_percentage = (pct * 100.0).round() / 100.0;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{compose, AnalysisParameters};
    use crate::gaps::{EvaluationBoundaries, Gap};

    fn result(failed: bool, human: Option<&str>) -> EvaluationResult {
        let gaps = if failed {
            vec![Gap {
                start_time: 20.0,
                end_time: 25.0,
                duration: 5.0,
            }]
        } else {
            vec![]
        };
        compose(
            "x",
            gaps,
            60.0,
            EvaluationBoundaries {
                start_time: 10.0,
                end_time: 50.0,
            },
            AnalysisParameters::default(),
            human,
        )
    }

    #[test]
    fn confusion_counts() {
        let results = vec![
            result(true, Some("FAILED")),
            result(true, Some("passed")),
            result(false, Some("PASSED")),
            result(false, Some("FAILED")),
            result(false, Some("Passed")),
            result(true, None),
            result(false, Some("unsure")),
        ];
        let stats = EvaluationStatistics::from_results(&results);

        assert_eq!(stats.total_comparisons, 5);
        assert_eq!(stats.true_positives, 1);
        assert_eq!(stats.true_negatives, 2);
        assert_eq!(stats.false_positives, 1);
        assert_eq!(stats.false_negatives, 1);
        assert_eq!(stats.matches, 3);
        assert_eq!(stats.ungraded, 2);
        assert_eq!(stats.accuracy_percentage, 60.0);
    }

    #[test]
    fn accuracy_rounds_to_two_decimals() {
        let results = vec![
            result(true, Some("FAILED")),
            result(true, Some("PASSED")),
            result(true, Some("PASSED")),
        ];
        let stats = EvaluationStatistics::from_results(&results);
        assert_eq!(stats.accuracy_percentage, 33.33);
    }

    #[test]
    fn nothing_to_compare_is_zero() {
        let stats = EvaluationStatistics::from_results(&Vec::<EvaluationResult>::new());
        assert_eq!(stats, EvaluationStatistics::default());
    }
}
