// crates/analysis/src/motion.rs
//! Motion and edge statistics over ~20 evenly sampled frames.

use std::time::Instant;

use async_trait::async_trait;
use railvision_core::{AnalysisBackend, BackendError, MediaReference};
use serde::Serialize;

use crate::frame::{self, GrayFrame};
use crate::video::{FrameSource, VideoProperties};

pub const NAME: &str = "opencv_basic";

const TARGET_SAMPLES: u64 = 20;
/// Mean absolute difference between consecutive samples that counts as motion.
pub const MOTION_THRESHOLD: f64 = 30.0;
const DETAIL_FRAMES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameAnalysis {
    pub frame_number: u64,
    pub motion_detected: bool,
    pub edge_density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionSummary {
    pub motion_detected: bool,
    pub frames_analyzed: usize,
    pub average_edge_density: f64,
}

#[derive(Debug, Serialize)]
struct MotionEdgeReport {
    video_path: String,
    video_properties: VideoProperties,
    analysis_results: MotionSummary,
    processing_time: String,
    processed_at: String,
    model_name: &'static str,
    frame_analysis: Vec<FrameAnalysis>,
}

/// Per-frame motion and edge statistics plus their aggregate.
///
/// The first frame never reports motion.
pub fn analyze_frames(frames: &[GrayFrame]) -> (Vec<FrameAnalysis>, MotionSummary) {
    let mut per_frame = Vec::with_capacity(frames.len());
    let mut previous: Option<&GrayFrame> = None;

    for current in frames {
        let motion_detected = previous
            .and_then(|prev| frame::mean_abs_diff(prev, current))
            .is_some_and(|diff| diff > MOTION_THRESHOLD);
        per_frame.push(FrameAnalysis {
            frame_number: current.index,
            motion_detected,
            edge_density: frame::edge_density(current),
        });
        previous = Some(current);
    }

    let average_edge_density = if per_frame.is_empty() {
        0.0
    } else {
        per_frame.iter().map(|f| f.edge_density).sum::<f64>() / per_frame.len() as f64
    };
    let summary = MotionSummary {
        motion_detected: per_frame.iter().any(|f| f.motion_detected),
        frames_analyzed: per_frame.len(),
        average_edge_density,
    };
    (per_frame, summary)
}

#[derive(Debug, Clone, Default)]
pub struct MotionEdgeBackend {
    source: FrameSource,
}

impl MotionEdgeBackend {
    pub fn new(source: FrameSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AnalysisBackend for MotionEdgeBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, media: &MediaReference) -> Result<serde_json::Value, BackendError> {
        let started = Instant::now();
        let path = media.path();

        let props = self.source.probe(path).await?;
        let step = props.sample_step(TARGET_SAMPLES);
        let frames = self
            .source
            .sample_frames(path, &props, step, TARGET_SAMPLES as usize + 1)
            .await?;
        tracing::debug!(video = %media, frames = frames.len(), step, "Sampled frames for motion analysis");

        let (mut per_frame, summary) = tokio::task::spawn_blocking(move || analyze_frames(&frames))
            .await
            .map_err(|e| BackendError::Failed(format!("frame analysis task failed: {e}")))?;
        per_frame.truncate(DETAIL_FRAMES);

        let report = MotionEdgeReport {
            video_path: media.to_string(),
            video_properties: props,
            analysis_results: summary,
            processing_time: crate::format_elapsed(started.elapsed()),
            processed_at: crate::processed_at(),
            model_name: NAME,
            frame_analysis: per_frame,
        };
        serde_json::to_value(report).map_err(|e| BackendError::Failed(e.to_string()))
    }
}
