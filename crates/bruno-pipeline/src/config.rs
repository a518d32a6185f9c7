//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Interval and overall deadline of a long-running remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between status fetches
    pub interval: Duration,
    /// Wall-clock budget measured from submission
    pub deadline: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            deadline: Duration::from_secs(300),
        }
    }
}

impl PollerConfig {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    fn from_env(interval_key: &str, deadline_key: &str) -> Self {
        let defaults = Self::default();
        Self {
            interval: env_secs(interval_key).unwrap_or(defaults.interval),
            deadline: env_secs(deadline_key).unwrap_or(defaults.deadline),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Longest accepted input video, in seconds
    pub duration_ceiling_secs: f64,
    /// Parent directory of per-run artifact directories
    pub work_dir: PathBuf,
    /// Where finished videos are persisted
    pub output_dir: PathBuf,
    /// Audio generation polling
    pub audio_poll: PollerConfig,
    /// Video annotation polling
    pub analysis_poll: PollerConfig,
    /// Upper bound on one ffmpeg merge
    pub merge_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            duration_ceiling_secs: 60.0,
            work_dir: std::env::temp_dir().join("bruno"),
            output_dir: PathBuf::from("outputs"),
            audio_poll: PollerConfig::default(),
            analysis_poll: PollerConfig::default(),
            merge_timeout: Duration::from_secs(300),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            duration_ceiling_secs: std::env::var("DURATION_CEILING_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| *v > 0.0)
                .unwrap_or(defaults.duration_ceiling_secs),
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            audio_poll: PollerConfig::from_env("SUNO_POLL_INTERVAL_SECS", "SUNO_POLL_DEADLINE_SECS"),
            analysis_poll: PollerConfig::from_env("GCP_POLL_INTERVAL_SECS", "GCP_POLL_DEADLINE_SECS"),
            merge_timeout: env_secs("MERGE_TIMEOUT_SECS").unwrap_or(defaults.merge_timeout),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
}
