//! Silence detection over a decoded [`AudioBuffer`].
//!
//! ## Algorithm
//!
//! 1. Split the buffer into fixed windows of `window_ms` (the trailing partial
//!    window is kept as long as one full window exists).
//! 2. A window is silent when its RMS loudness is at or below
//!    `min_amplitude_dbfs`. Digital silence is `-inf` dBFS and always silent.
//! 3. Consecutive silent windows coalesce into one run.
//! 4. Runs shorter than `min_silence_seconds` are dropped here, before any
//!    dead-air threshold is applied downstream.

pub mod loudness;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::AudioBuffer;

/// Analysis window length used when none is configured.
pub const DEFAULT_WINDOW_MS: u32 = 10;

/// Shortest silent run the detector reports when none is configured.
pub const DEFAULT_MIN_SILENCE_SECONDS: f64 = 0.5;

/// Absorbs float noise when comparing run lengths against a floor.
const DURATION_EPSILON: f64 = 1e-9;

/// A contiguous silent span of the buffer, in seconds from its start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl SilenceInterval {
    pub fn new(start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            start_seconds,
            end_seconds,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Window-based silence detector.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    /// Analysis window length in milliseconds.
    window_ms: u32,
    /// Windows at or below this loudness (dBFS) are silent.
    min_amplitude_dbfs: f64,
    /// Shortest run reported, in seconds.
    min_silence_seconds: f64,
}

impl SilenceDetector {
    pub fn new(min_amplitude_dbfs: f64, min_silence_seconds: f64) -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            min_amplitude_dbfs,
            min_silence_seconds,
        }
    }

    /// Override the analysis window. Zero is treated as one millisecond.
    pub fn with_window_ms(mut self, window_ms: u32) -> Self {
        self.window_ms = window_ms.max(1);
        self
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// Scan the buffer and return silent intervals in ascending order.
    pub fn detect(&self, buffer: &AudioBuffer) -> Vec<SilenceInterval> {
        let rate = buffer.sample_rate();
        let frames = buffer.frames();
        let channels = buffer.channels() as usize;
        let window_frames = ((rate as u64 * self.window_ms as u64) / 1000) as usize;

        if rate == 0 || window_frames == 0 || frames < window_frames {
            return Vec::new();
        }

        let mut intervals = Vec::new();
        let mut run_start: Option<usize> = None;
        let mut windows = 0usize;
        let mut silent_windows = 0usize;

        for (i, window) in buffer.samples().chunks(window_frames * channels).enumerate() {
            let start_frame = i * window_frames;
            windows += 1;
            let silent = f64::from(loudness::dbfs(window)) <= self.min_amplitude_dbfs;

            if silent {
                silent_windows += 1;
                run_start.get_or_insert(start_frame);
            } else if let Some(start) = run_start.take() {
                self.push_run(&mut intervals, start, start_frame, rate);
            }
        }
        if let Some(start) = run_start {
            self.push_run(&mut intervals, start, frames, rate);
        }

        debug!(
            windows,
            silent_windows,
            intervals = intervals.len(),
            "silence scan complete"
        );
        intervals
    }

    fn push_run(&self, out: &mut Vec<SilenceInterval>, start: usize, end: usize, rate: u32) {
        let interval = SilenceInterval::new(
            start as f64 / rate as f64,
            end as f64 / rate as f64,
        );
        if interval.duration() > 0.0
            && interval.duration() + DURATION_EPSILON >= self.min_silence_seconds
        {
            out.push(interval);
        }
    }
}

/// Detect silence with the default analysis window.
pub fn detect(
    buffer: &AudioBuffer,
    min_amplitude_dbfs: f64,
    min_silence_seconds: f64,
) -> Vec<SilenceInterval> {
    SilenceDetector::new(min_amplitude_dbfs, min_silence_seconds).detect(buffer)
}
