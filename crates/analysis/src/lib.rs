// crates/analysis/src/lib.rs
//! Concrete analysis backends.
//!
//! - `dummy`: simulated latency with a synthetic result
//! - `opencv_basic`: motion and edge statistics (`MotionEdgeBackend`)
//! - `railway_detection`: track, train and obstacle heuristics
//!
//! Video decoding goes through external `ffprobe`/`ffmpeg` processes. Frames
//! arrive as `image::GrayImage` buffers and the vision primitives in
//! [`frame`] come from `imageproc`.

pub mod dummy;
pub mod frame;
pub mod motion;
pub mod railway;
pub mod video;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use railvision_core::BackendRegistry;

pub use dummy::DummyBackend;
pub use motion::MotionEdgeBackend;
pub use railway::RailwayDetectionBackend;
pub use video::{FfmpegError, FrameSource, VideoProperties};

/// Settings shared by the built-in backends.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub dummy_min_delay: Duration,
    pub dummy_max_delay: Duration,
    pub ffprobe_path: PathBuf,
    pub ffmpeg_path: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dummy_min_delay: Duration::from_millis(1500),
            dummy_max_delay: Duration::from_millis(3000),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

/// Registry populated with every built-in backend.
pub fn default_registry(config: &AnalysisConfig) -> BackendRegistry {
    let source = FrameSource::new(&config.ffprobe_path, &config.ffmpeg_path);
    let registry = BackendRegistry::new();
    registry.register(Arc::new(DummyBackend::new(
        config.dummy_min_delay,
        config.dummy_max_delay,
    )));
    registry.register(Arc::new(MotionEdgeBackend::new(source.clone())));
    registry.register(Arc::new(RailwayDetectionBackend::new(source)));
    registry
}

/// Elapsed time rendered as seconds with two decimals, e.g. "2.41s".
pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

pub(crate) fn processed_at() -> String {
    chrono::Utc::now().to_rfc3339()
}
