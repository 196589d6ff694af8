// crates/analysis/src/railway.rs
//! Railway heuristics: track-like horizontal lines, bright masses that may
//! be trains, and dark masses that may be obstacles.

use std::time::Instant;

use async_trait::async_trait;
use railvision_core::{AnalysisBackend, BackendError, MediaReference};
use serde::Serialize;

use crate::frame::{self, GrayFrame, Polarity};
use crate::video::{FrameSource, VideoProperties};

pub const NAME: &str = "railway_detection";

const TARGET_SAMPLES: u64 = 30;
/// Edge pixels a straight line needs before it counts as track.
const MIN_TRACK_LENGTH: u32 = 100;
/// Lines within this many degrees of horizontal are track candidates.
const TRACK_ANGLE_TOLERANCE: u32 = 15;
const BRIGHT_LEVEL: u8 = 200;
const BRIGHT_MIN_AREA: usize = 1000;
const DARK_LEVEL: u8 = 50;
const DARK_MIN_AREA: usize = 500;
/// Average track lines per frame above which visibility is "good".
const GOOD_VISIBILITY_LINES: f64 = 2.0;

/// Detections within a single sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCounts {
    pub track_lines: usize,
    pub bright_objects: usize,
    pub dark_objects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RailwayAnalysis {
    pub avg_track_lines_per_frame: f64,
    pub max_track_lines_detected: usize,
    pub avg_bright_objects_per_frame: f64,
    pub max_bright_objects_detected: usize,
    pub avg_dark_objects_per_frame: f64,
    pub max_dark_objects_detected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackVisibility {
    Good,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyAssessment {
    pub track_visibility: TrackVisibility,
    pub potential_trains_detected: bool,
    pub potential_obstacles: bool,
}

#[derive(Debug, Serialize)]
struct RailwayReport {
    video_path: String,
    video_properties: VideoProperties,
    railway_analysis: RailwayAnalysis,
    safety_assessment: SafetyAssessment,
    processing_time: String,
    processed_at: String,
    model_name: &'static str,
}

pub fn count_frame(gray: &GrayFrame) -> FrameCounts {
    let edge_map = frame::edges(gray);
    FrameCounts {
        track_lines: frame::horizontal_lines(&edge_map, MIN_TRACK_LENGTH, TRACK_ANGLE_TOLERANCE),
        bright_objects: frame::count_regions(gray, BRIGHT_LEVEL, Polarity::Above, BRIGHT_MIN_AREA),
        dark_objects: frame::count_regions(gray, DARK_LEVEL, Polarity::AtOrBelow, DARK_MIN_AREA),
    }
}

pub fn summarize(counts: &[FrameCounts]) -> (RailwayAnalysis, SafetyAssessment) {
    let avg = |f: fn(&FrameCounts) -> usize| {
        if counts.is_empty() {
            0.0
        } else {
            counts.iter().map(f).sum::<usize>() as f64 / counts.len() as f64
        }
    };
    let max = |f: fn(&FrameCounts) -> usize| counts.iter().map(f).max().unwrap_or(0);

    let analysis = RailwayAnalysis {
        avg_track_lines_per_frame: avg(|c| c.track_lines),
        max_track_lines_detected: max(|c| c.track_lines),
        avg_bright_objects_per_frame: avg(|c| c.bright_objects),
        max_bright_objects_detected: max(|c| c.bright_objects),
        avg_dark_objects_per_frame: avg(|c| c.dark_objects),
        max_dark_objects_detected: max(|c| c.dark_objects),
    };
    let safety = SafetyAssessment {
        track_visibility: if analysis.avg_track_lines_per_frame > GOOD_VISIBILITY_LINES {
            TrackVisibility::Good
        } else {
            TrackVisibility::Poor
        },
        potential_trains_detected: analysis.max_bright_objects_detected > 0,
        potential_obstacles: analysis.max_dark_objects_detected > 0,
    };
    (analysis, safety)
}

#[derive(Debug, Clone, Default)]
pub struct RailwayDetectionBackend {
    source: FrameSource,
}

impl RailwayDetectionBackend {
    pub fn new(source: FrameSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl AnalysisBackend for RailwayDetectionBackend {
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
        tracing::debug!(video = %media, frames = frames.len(), step, "Sampled frames for railway analysis");

        let (railway_analysis, safety_assessment) = tokio::task::spawn_blocking(move || {
            let counts: Vec<FrameCounts> = frames.iter().map(count_frame).collect();
            summarize(&counts)
        })
        .await
        .map_err(|e| BackendError::Failed(format!("frame analysis task failed: {e}")))?;

        let report = RailwayReport {
            video_path: media.to_string(),
            video_properties: props,
            railway_analysis,
            safety_assessment,
            processing_time: crate::format_elapsed(started.elapsed()),
            processed_at: crate::processed_at(),
            model_name: NAME,
        };
        serde_json::to_value(report).map_err(|e| BackendError::Failed(e.to_string()))
    }
}
