// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use railvision_analysis::AnalysisConfig;
use railvision_core::OrchestratorConfig;

/// Video analysis job service.
#[derive(Debug, Clone, Parser)]
#[command(name = "railvision", version, about)]
pub struct Config {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory holding one subdirectory per uploaded job.
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload, e.g. "100MB" or "512KB".
    #[arg(long, env = "MAX_FILE_SIZE", default_value = "100MB", value_parser = parse_size)]
    pub max_file_size: u64,

    /// Backends allowed to run at once; 0 removes the limit.
    #[arg(long, env = "MAX_WORKERS", default_value_t = 4)]
    pub max_workers: usize,

    /// Backend used when an upload does not name one.
    #[arg(long, env = "DEFAULT_MODEL", default_value = "dummy")]
    pub default_model: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Also write logs to this file.
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Fail jobs whose backend runs longer than this.
    #[arg(long, env = "JOB_TIMEOUT_SECS")]
    pub job_timeout_secs: Option<u64>,

    /// Forget finished jobs (and delete their uploads) after this long.
    #[arg(long, env = "JOB_RETENTION_SECS")]
    pub job_retention_secs: Option<u64>,

    #[arg(long, env = "DUMMY_MIN_SECS", default_value_t = 1.5, value_parser = parse_secs)]
    pub dummy_min_secs: f64,

    #[arg(long, env = "DUMMY_MAX_SECS", default_value_t = 3.0, value_parser = parse_secs)]
    pub dummy_max_secs: f64,

    #[arg(long, env = "FFPROBE_PATH", default_value = "ffprobe")]
    pub ffprobe_path: PathBuf,

    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,
}

impl Config {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent_jobs: (self.max_workers > 0).then_some(self.max_workers),
            job_timeout: self.job_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            dummy_min_delay: Duration::from_secs_f64(self.dummy_min_secs),
            dummy_max_delay: Duration::from_secs_f64(self.dummy_max_secs),
            ffprobe_path: self.ffprobe_path.clone(),
            ffmpeg_path: self.ffmpeg_path.clone(),
        }
    }

    pub fn retention(&self) -> Option<Duration> {
        self.job_retention_secs.map(Duration::from_secs)
    }

    /// Request body cap for uploads. Leaves room for multipart framing and
    /// the `model_name` field on top of the file itself.
    pub fn body_limit(&self) -> usize {
        const MULTIPART_OVERHEAD: u64 = 64 * 1024;
        usize::try_from(self.max_file_size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX)
    }
}

/// Parse a human-readable byte size: "100MB", "512 kb", "1.5GB", "4096".
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{input}': expected a number with optional unit"))?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        other => return Err(format!("invalid size unit '{other}': use B, KB, MB or GB")),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes < 1.0 {
        return Err(format!("size must be at least one byte, got '{input}'"));
    }
    Ok(bytes as u64)
}

fn parse_secs(input: &str) -> Result<f64, String> {
    let secs: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{input}': expected seconds"))?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(format!("duration must be a non-negative number of seconds, got '{input}'"))
    }
}
