// crates/analysis/src/dummy.rs
//! Backend that simulates analysis latency and returns a synthetic result.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use railvision_core::{AnalysisBackend, BackendError, MediaReference};
use serde::Serialize;

pub const NAME: &str = "dummy";

#[derive(Debug, Serialize)]
struct DummyReport<'a> {
    video_path: String,
    objects_detected: u32,
    processing_time: String,
    processed_at: String,
    model_name: &'a str,
}

#[derive(Debug, Clone)]
pub struct DummyBackend {
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500), Duration::from_millis(3000))
    }
}

impl DummyBackend {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        if min_delay <= max_delay {
            Self { min_delay, max_delay }
        } else {
            Self {
                min_delay: max_delay,
                max_delay: min_delay,
            }
        }
    }
}

#[async_trait]
impl AnalysisBackend for DummyBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, media: &MediaReference) -> Result<serde_json::Value, BackendError> {
        let (delay, objects_detected) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(self.min_delay..=self.max_delay),
                rng.gen_range(1..=5),
            )
        };

        tokio::time::sleep(delay).await;

        let report = DummyReport {
            video_path: media.to_string(),
            objects_detected,
            processing_time: crate::format_elapsed(delay),
            processed_at: crate::processed_at(),
            model_name: NAME,
        };
        serde_json::to_value(report).map_err(|e| BackendError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dummy_result_shape() {
        let backend = DummyBackend::new(Duration::ZERO, Duration::from_millis(5));
        let media = MediaReference::new("uploads/abc/video.mp4");

        let result = backend.run(&media).await.unwrap();

        assert_eq!(result["video_path"], "uploads/abc/video.mp4");
        assert_eq!(result["model_name"], "dummy");
        let objects = result["objects_detected"].as_u64().unwrap();
        assert!((1..=5).contains(&objects));
        assert!(result["processing_time"].as_str().unwrap().ends_with('s'));
        assert!(result["processed_at"].is_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dummy_waits_within_range() {
        let backend = DummyBackend::new(Duration::from_secs(2), Duration::from_secs(3));
        let media = MediaReference::new("video.mp4");

        let started = tokio::time::Instant::now();
        backend.run(&media).await.unwrap();
        let waited = started.elapsed();

        assert!(waited >= Duration::from_secs(2));
        assert!(waited <= Duration::from_secs(3) + Duration::from_millis(50));
    }

    #[test]
    fn test_bounds_are_ordered() {
        let backend = DummyBackend::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(backend.min_delay, Duration::from_secs(1));
        assert_eq!(backend.max_delay, Duration::from_secs(3));
        assert_eq!(backend.name(), "dummy");
    }
}
