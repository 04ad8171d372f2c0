//! Batch evaluation over a fixed worker pool.
//!
//! ```text
//! ids ──► job channel ──► worker 0..N ──► DeadAirEngine::evaluate ──► result channel
//!                              ▲                                          │
//!                      running flag checked                    reassembled in input order
//!                      before each call
//! ```
//!
//! Clearing the `running` flag stops workers from picking up new calls; calls
//! already in flight finish and are reported normally.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::unbounded;
use serde::Serialize;
use tracing::{info, warn};

use super::{CallOutcome, DeadAirEngine, SaveStatus};
use crate::error::Result;

/// Calls between progress log lines.
const PROGRESS_EVERY: usize = 10;

/// Aggregate counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub with_dead_air: usize,
    pub without_dead_air: usize,
    /// Calls never started because the batch was cancelled.
    pub cancelled: usize,
    /// `(audio_identifier, message)` for each failed call.
    pub errors: Vec<(String, String)>,
}

/// Per-call entry in a batch report.
#[derive(Debug)]
pub struct CallReport {
    pub audio_identifier: String,
    /// `None` when the call was never started.
    pub outcome: Option<Result<CallOutcome>>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub summary: BatchSummary,
    /// One entry per requested identifier, in request order.
    pub calls: Vec<CallReport>,
}

/// Runs [`DeadAirEngine::evaluate`] over many calls with bounded parallelism.
pub struct BatchRunner {
    engine: Arc<DeadAirEngine>,
    workers: usize,
    /// `true` while the batch may start new calls.
    running: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(engine: Arc<DeadAirEngine>, workers: usize) -> Self {
        Self {
            engine,
            workers: workers.max(1),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Share an externally owned flag, e.g. one cleared by a signal handler.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Evaluate every identifier and block until the batch finishes or is
    /// cancelled.
    pub fn run<S: AsRef<str>>(&self, ids: &[S]) -> BatchReport {
        let total = ids.len();
        let workers = self.workers.min(total.max(1));
        info!(total, workers, reprocess = self.engine.config().reprocess, "batch started");

        let (job_tx, job_rx) = unbounded::<(usize, &str)>();
        for (index, id) in ids.iter().enumerate() {
            if job_tx.send((index, id.as_ref())).is_err() {
                break;
            }
        }
        drop(job_tx);

        let (done_tx, done_rx) = unbounded::<(usize, Result<CallOutcome>)>();
        let completed = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let completed = &completed;
                scope.spawn(move || {
                    while self.running.load(Ordering::SeqCst) {
                        let Ok((index, id)) = job_rx.recv() else {
                            break;
                        };
                        let outcome = self.engine.evaluate(id);
                        let n = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        if n % PROGRESS_EVERY == 0 {
                            info!(completed = n, total, "batch progress");
                        }
                        if done_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(done_tx);

        let mut outcomes: Vec<Option<Result<CallOutcome>>> = (0..total).map(|_| None).collect();
        for (index, outcome) in done_rx.iter() {
            outcomes[index] = Some(outcome);
        }

        let calls: Vec<CallReport> = ids
            .iter()
            .zip(outcomes)
            .map(|(id, outcome)| CallReport {
                audio_identifier: id.as_ref().to_string(),
                outcome,
            })
            .collect();
        let summary = summarize(&calls);

        if summary.cancelled > 0 {
            warn!(cancelled = summary.cancelled, "batch cancelled before completion");
        }
        info!(
            processed = summary.processed,
            successful = summary.successful,
            failed = summary.failed,
            with_dead_air = summary.with_dead_air,
            without_dead_air = summary.without_dead_air,
            "batch finished"
        );
        BatchReport { summary, calls }
    }
}

/// Fold per-call reports into counts.
///
/// A call whose result could not be persisted counts as failed, even though
/// its analysis is available in the report.
pub fn summarize(calls: &[CallReport]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for call in calls {
        let Some(outcome) = &call.outcome else {
            summary.cancelled += 1;
            continue;
        };
        summary.processed += 1;
        match outcome {
            Ok(CallOutcome {
                save: SaveStatus::Failed { error },
                ..
            }) => {
                summary.failed += 1;
                summary
                    .errors
                    .push((call.audio_identifier.clone(), format!("persistence failed: {error}")));
            }
            Ok(CallOutcome { result, .. }) => {
                summary.successful += 1;
                if result.passed {
                    summary.without_dead_air += 1;
                } else {
                    summary.with_dead_air += 1;
                }
            }
            Err(e) => {
                summary.failed += 1;
                summary
                    .errors
                    .push((call.audio_identifier.clone(), e.to_string()));
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeadAirError;
    use crate::evaluation::{compose, AnalysisParameters};
    use crate::gaps::EvaluationBoundaries;
    use crate::store::SaveOutcome;

    fn outcome(passed: bool, save: SaveStatus) -> CallOutcome {
        let gaps = if passed {
            vec![]
        } else {
            vec![crate::gaps::Gap {
                start_time: 20.0,
                end_time: 26.0,
                duration: 6.0,
            }]
        };
        CallOutcome {
            result: compose(
                "x",
                gaps,
                60.0,
                EvaluationBoundaries {
                    start_time: 10.0,
                    end_time: 50.0,
                },
                AnalysisParameters::default(),
                None,
            ),
            save,
        }
    }

    fn report(id: &str, outcome: Option<Result<CallOutcome>>) -> CallReport {
        CallReport {
            audio_identifier: id.into(),
            outcome,
        }
    }

    #[test]
    fn summary_counts_every_category() {
        let calls = vec![
            report("a", Some(Ok(outcome(true, SaveStatus::Saved(SaveOutcome::inserted()))))),
            report("b", Some(Ok(outcome(false, SaveStatus::Saved(SaveOutcome::inserted()))))),
            report(
                "c",
                Some(Ok(outcome(true, SaveStatus::Saved(SaveOutcome::already_evaluated())))),
            ),
            report(
                "d",
                Some(Ok(outcome(
                    false,
                    SaveStatus::Failed {
                        error: "locked".into(),
                    },
                ))),
            ),
            report("e", Some(Err(DeadAirError::Decode("bad header".into())))),
            report("f", None),
        ];
        let summary = summarize(&calls);

        assert_eq!(summary.processed, 5);
        assert_eq!(summary.successful, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.with_dead_air, 1);
        assert_eq!(summary.without_dead_air, 2);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.errors.len(), 2);
        assert_eq!(summary.errors[0].0, "d");
        assert_eq!(summary.errors[1].0, "e");
    }
}
