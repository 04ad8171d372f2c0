//! deadair command-line entry point.
//!
//! ## Runtime note
//!
//! Analysis is CPU-bound and synchronous. It runs on Tokio's blocking pool
//! (`spawn_blocking`) so the async side stays free to watch for Ctrl-C and
//! flip the batch's running flag.

mod cli;
mod settings;
mod storage;

use std::path::Path;
use std::sync::{atomic::Ordering, Arc};

use anyhow::{bail, Context};
use clap::Parser;
use deadair_core::{
    engine::pipeline,
    evaluation::report::improvement_suggestion,
    explanation, BatchRunner, DeadAirEngine, EngineConfig, EvaluationResult,
    EvaluationStatistics, EvaluationStore, Grade, SaveStatus, AUDIO_ANALYSIS_CONTEXT,
};
use serde::Serialize;
use tracing::{info, warn};

use cli::{Cli, Commands};
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use storage::{CallImport, CandidateFilter, LocalStore};

/// A result as printed: the stored record plus its human-readable summary.
#[derive(Serialize)]
struct ResultView<'a> {
    #[serde(flatten)]
    result: &'a EvaluationResult,
    explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    save: Option<&'a SaveStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    evaluated_at: Option<String>,
}

impl<'a> ResultView<'a> {
    fn new(result: &'a EvaluationResult) -> Self {
        Self {
            result,
            explanation: explanation(result),
            suggestion: improvement_suggestion(result),
            save: None,
            evaluated_at: None,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "deadair=info,deadair_core=info",
        1 => "deadair=debug,deadair_core=debug",
        _ => "deadair=trace,deadair_core=trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn engine_config(settings: &AppSettings, reprocess: bool) -> EngineConfig {
    EngineConfig {
        parameters: settings.analysis_parameters(),
        reprocess,
        detector_min_silence_seconds: settings.detector_min_silence_seconds,
        ..EngineConfig::default()
    }
}

fn open_store(settings: &AppSettings) -> anyhow::Result<Arc<LocalStore>> {
    let path = settings.resolved_db_path();
    let store = LocalStore::new(path.clone())
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn build_engine(store: &Arc<LocalStore>, config: EngineConfig) -> anyhow::Result<Arc<DeadAirEngine>> {
    let engine = DeadAirEngine::new(config, store.clone(), store.clone())
        .context("invalid analysis parameters")?;
    Ok(Arc::new(engine))
}

fn read_audio(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings_path = cli.config.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    settings.apply_env_overrides();
    cli.analysis.apply(&mut settings);
    if let Some(db) = &cli.db {
        settings.db_path = Some(db.clone());
    }

    match cli.command {
        Commands::Analyze { file, human_grade } => {
            let bytes = read_audio(&file)?;
            let id = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let config = engine_config(&settings, false);
            let result = tokio::task::spawn_blocking(move || {
                pipeline::analyze_bytes(&id, &bytes, &config, human_grade.as_deref())
            })
            .await?
            .with_context(|| format!("failed to analyze {}", file.display()))?;
            print_json(&ResultView::new(&result))?;
        }

        Commands::Evaluate { id, reprocess } => {
            let store = open_store(&settings)?;
            let engine = build_engine(&store, engine_config(&settings, reprocess))?;
            let eval_id = id.clone();
            let outcome = tokio::task::spawn_blocking(move || engine.evaluate(&eval_id))
                .await?
                .with_context(|| format!("failed to evaluate call {id}"))?;

            let mut view = ResultView::new(&outcome.result);
            view.save = Some(&outcome.save);
            print_json(&view)?;
            if let SaveStatus::Failed { error } = &outcome.save {
                bail!("evaluation of call {id} could not be saved: {error}");
            }
        }

        Commands::Batch {
            limit,
            reprocess,
            workers,
            include_ungraded,
        } => {
            let store = open_store(&settings)?;
            let ids = store.list_candidates(CandidateFilter {
                limit,
                skip_evaluated: !reprocess,
                include_ungraded,
            })?;
            if ids.is_empty() {
                info!("no calls to evaluate");
                print_json(&deadair_core::BatchSummary::default())?;
                return Ok(());
            }

            let engine = build_engine(&store, engine_config(&settings, reprocess))?;
            let runner = BatchRunner::new(engine, workers.unwrap_or(settings.workers));
            let running = runner.running_flag();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing calls in flight");
                    running.store(false, Ordering::SeqCst);
                }
            });

            let report = tokio::task::spawn_blocking(move || runner.run(ids.as_slice())).await?;
            interrupt.abort();

            for (id, message) in &report.summary.errors {
                warn!(audio_identifier = %id, error = %message, "call failed");
            }
            print_json(&report.summary)?;
        }

        Commands::Stats => {
            let store = open_store(&settings)?;
            let results = store.list(AUDIO_ANALYSIS_CONTEXT)?;
            print_json(&EvaluationStatistics::from_results(&results))?;
        }

        Commands::Import {
            file,
            id,
            human_grade,
            excerpt,
        } => {
            let bytes = read_audio(&file)?;
            let buffer = deadair_core::audio::decode(&bytes)
                .with_context(|| format!("{} is not a usable WAV file", file.display()))?;
            if let Some(grade) = human_grade.as_deref() {
                if grade.parse::<Grade>().is_err() {
                    warn!(grade, "human grade is neither PASSED nor FAILED; it will not be compared");
                }
            }

            let store = open_store(&settings)?;
            store.import_call(CallImport {
                identifier: &id,
                audio: &bytes,
                human_grade: human_grade.as_deref(),
                transcription_excerpt: excerpt.as_deref(),
            })?;
            info!(
                audio_identifier = %id,
                duration = buffer.duration_seconds(),
                sample_rate = buffer.sample_rate(),
                channels = buffer.channels(),
                "call imported"
            );
            if let Some(call) = store.get_call(&id)? {
                print_json(&call)?;
            }
        }

        Commands::Show { id } => {
            let store = open_store(&settings)?;
            let Some(result) = store.load(&id, AUDIO_ANALYSIS_CONTEXT)? else {
                bail!("call {id} has not been evaluated");
            };
            let mut view = ResultView::new(&result);
            view.evaluated_at = store.evaluated_at(&id)?;
            print_json(&view)?;
        }

        Commands::Config { write } => {
            if write {
                save_settings(&settings_path, &settings)
                    .with_context(|| format!("failed to write {}", settings_path.display()))?;
                info!(path = %settings_path.display(), "settings written");
            }
            print_json(&settings)?;
        }
    }

    Ok(())
}
