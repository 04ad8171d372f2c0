//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use deadair_core::AnalysisParameters;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::LocalStore;

const MAX_WORKERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// `None` uses [`LocalStore::default_db_path`].
    pub db_path: Option<PathBuf>,
    pub threshold_seconds: f64,
    pub skip_start_seconds: f64,
    pub skip_end_seconds: f64,
    pub min_amplitude_dbfs: f64,
    pub workers: usize,
    pub detector_min_silence_seconds: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        let params = AnalysisParameters::default();
        Self {
            db_path: None,
            threshold_seconds: params.threshold_seconds,
            skip_start_seconds: params.skip_start_seconds,
            skip_end_seconds: params.skip_end_seconds,
            min_amplitude_dbfs: params.min_amplitude_dbfs,
            workers: 4,
            detector_min_silence_seconds: 0.5,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.threshold_seconds = finite_or(self.threshold_seconds, defaults.threshold_seconds)
            .clamp(0.0, 3600.0);
        self.skip_start_seconds = finite_or(self.skip_start_seconds, defaults.skip_start_seconds)
            .clamp(0.0, 86_400.0);
        self.skip_end_seconds =
            finite_or(self.skip_end_seconds, defaults.skip_end_seconds).clamp(0.0, 86_400.0);
        self.min_amplitude_dbfs =
            finite_or(self.min_amplitude_dbfs, defaults.min_amplitude_dbfs).clamp(-120.0, 0.0);
        self.detector_min_silence_seconds = finite_or(
            self.detector_min_silence_seconds,
            defaults.detector_min_silence_seconds,
        )
        .clamp(0.01, 60.0);
        self.workers = self.workers.clamp(1, MAX_WORKERS);
        self.db_path = self
            .db_path
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }

    /// Apply `DEADAIR_DB_PATH` and `DEADAIR_WORKERS` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = std::env::var_os("DEADAIR_DB_PATH").filter(|p| !p.is_empty()) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Ok(raw) = std::env::var("DEADAIR_WORKERS") {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.workers = n,
                Err(_) => warn!(value = %raw, "ignoring invalid DEADAIR_WORKERS"),
            }
        }
        self.normalize();
    }

    pub fn analysis_parameters(&self) -> AnalysisParameters {
        AnalysisParameters {
            threshold_seconds: self.threshold_seconds,
            skip_start_seconds: self.skip_start_seconds,
            skip_end_seconds: self.skip_end_seconds,
            min_amplitude_dbfs: self.min_amplitude_dbfs,
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(LocalStore::default_db_path)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("DeadAir")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("deadair")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| match serde_json::from_str::<AppSettings>(&raw) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings file unreadable, using defaults");
                None
            }
        })
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
