//! Command-line interface for deadair.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::settings::AppSettings;

/// Dead-air detection for recorded calls
#[derive(Parser, Debug)]
#[command(name = "deadair", version, about = "Dead-air detection for recorded calls")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// SQLite database holding calls and evaluations
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Overrides for the analysis parameters in the settings file.
#[derive(Args, Debug, Default, Clone)]
pub struct AnalysisArgs {
    /// Minimum silence (seconds) that counts as dead air
    #[arg(long, global = true, value_name = "SECONDS")]
    pub threshold: Option<f64>,

    /// Seconds ignored at the start of each call
    #[arg(long, global = true, value_name = "SECONDS")]
    pub skip_start: Option<f64>,

    /// Seconds ignored at the end of each call
    #[arg(long, global = true, value_name = "SECONDS")]
    pub skip_end: Option<f64>,

    /// Loudness (dBFS) at or below which audio is silent, e.g. -30
    #[arg(long, global = true, value_name = "DBFS", allow_negative_numbers = true)]
    pub min_amplitude: Option<f64>,
}

impl AnalysisArgs {
    /// Layer these flags over `settings`.
    pub fn apply(&self, settings: &mut AppSettings) {
        if let Some(v) = self.threshold {
            settings.threshold_seconds = v;
        }
        if let Some(v) = self.skip_start {
            settings.skip_start_seconds = v;
        }
        if let Some(v) = self.skip_end {
            settings.skip_end_seconds = v;
        }
        if let Some(v) = self.min_amplitude {
            settings.min_amplitude_dbfs = v;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a WAV file and print the result (nothing is stored)
    Analyze {
        /// WAV file to analyze
        file: PathBuf,

        /// Human grade to compare against (PASSED / FAILED)
        #[arg(long, value_name = "GRADE")]
        human_grade: Option<String>,
    },

    /// Evaluate one stored call and save the result
    Evaluate {
        /// Call identifier
        id: String,

        /// Replace an existing evaluation
        #[arg(long)]
        reprocess: bool,
    },

    /// Evaluate every eligible stored call
    Batch {
        /// Stop after this many calls
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Re-evaluate calls that already have an evaluation
        #[arg(long)]
        reprocess: bool,

        /// Worker threads (default: from settings)
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Include calls without a human grade
        #[arg(long)]
        include_ungraded: bool,
    },

    /// Agreement between machine and human grades
    Stats,

    /// Store a WAV file as a call
    Import {
        /// WAV file to import
        file: PathBuf,

        /// Identifier to store the call under
        #[arg(long)]
        id: String,

        /// Grade assigned by a human reviewer (PASSED / FAILED)
        #[arg(long, value_name = "GRADE")]
        human_grade: Option<String>,

        /// Short transcription excerpt kept alongside the audio
        #[arg(long, value_name = "TEXT")]
        excerpt: Option<String>,
    },

    /// Print the stored evaluation of a call
    Show {
        /// Call identifier
        id: String,
    },

    /// Print the effective settings
    Config {
        /// Also write them to the settings file
        #[arg(long)]
        write: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["deadair", "analyze", "call.wav"]).unwrap();
        match cli.command {
            Commands::Analyze { file, human_grade } => {
                assert_eq!(file, PathBuf::from("call.wav"));
                assert!(human_grade.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.verbose, 0);
        assert!(cli.analysis.threshold.is_none());
    }

    #[test]
    fn test_parse_batch_flags() {
        let cli = Cli::try_parse_from([
            "deadair", "batch", "--limit", "20", "--reprocess", "--workers", "8",
        ])
        .unwrap();
        match cli.command {
            Commands::Batch {
                limit,
                reprocess,
                workers,
                include_ungraded,
            } => {
                assert_eq!(limit, Some(20));
                assert!(reprocess);
                assert_eq!(workers, Some(8));
                assert!(!include_ungraded);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_analysis_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "deadair",
            "evaluate",
            "1234",
            "--threshold",
            "5",
            "--min-amplitude",
            "-40",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.analysis.threshold, Some(5.0));
        assert_eq!(cli.analysis.min_amplitude, Some(-40.0));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_import_requires_id() {
        assert!(Cli::try_parse_from(["deadair", "import", "call.wav"]).is_err());
        let cli =
            Cli::try_parse_from(["deadair", "import", "call.wav", "--id", "7", "--human-grade", "FAILED"])
                .unwrap();
        assert!(matches!(cli.command, Commands::Import { ref id, .. } if id == "7"));
    }

    #[test]
    fn test_flags_override_settings() {
        let mut settings = AppSettings::default();
        let args = AnalysisArgs {
            threshold: Some(2.0),
            skip_end: Some(0.0),
            ..AnalysisArgs::default()
        };
        args.apply(&mut settings);

        assert_eq!(settings.threshold_seconds, 2.0);
        assert_eq!(settings.skip_end_seconds, 0.0);
        assert_eq!(settings.skip_start_seconds, 10.0);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["deadair"]).is_err());
    }
}
