// crates/analysis/src/video.rs
//! Frame source backed by the external `ffprobe`/`ffmpeg` binaries.
//!
//! Decoding stays outside the process: ffprobe reports stream properties as
//! JSON and ffmpeg streams selected frames as raw 8-bit grayscale on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use railvision_core::BackendError;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::ChildStderr;

use crate::frame::GrayFrame;

/// Longest stderr excerpt kept for error reports.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("{binary} could not be started: {source}")]
    NotFound {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        binary: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("no video stream in {0}")]
    NoVideoStream(PathBuf),

    #[error("video file not found: {0}")]
    VideoNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FfmpegError> for BackendError {
    fn from(err: FfmpegError) -> Self {
        match err {
            FfmpegError::VideoNotFound(path) => BackendError::MediaUnreadable {
                path,
                reason: "file does not exist".into(),
            },
            FfmpegError::NoVideoStream(path) => BackendError::MediaUnreadable {
                path,
                reason: "no video stream".into(),
            },
            FfmpegError::Io(e) => BackendError::Io(e),
            other => BackendError::Decode(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Container-level properties of a video stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
    pub duration_seconds: f64,
}

impl VideoProperties {
    /// Decode every `n`th frame so that roughly `target` frames are analyzed.
    pub fn sample_step(&self, target: u64) -> u64 {
        (self.frame_count / target.max(1)).max(1)
    }
}

/// Locations of the ffmpeg tool binaries.
#[derive(Debug, Clone)]
pub struct FrameSource {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl Default for FrameSource {
    fn default() -> Self {
        Self::new("ffprobe", "ffmpeg")
    }
}

impl FrameSource {
    pub fn new(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Run `ffprobe` on a video file and extract the first video stream's properties.
    pub async fn probe(&self, path: &Path) -> Result<VideoProperties, FfmpegError> {
        if !path.exists() {
            return Err(FfmpegError::VideoNotFound(path.to_path_buf()));
        }

        let output = tokio::process::Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|source| FfmpegError::NotFound {
                binary: self.ffprobe.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(FfmpegError::ExecutionFailed {
                binary: self.ffprobe.display().to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| FfmpegError::ParseError(e.to_string()))?;
        properties_from_probe(&probe).ok_or_else(|| FfmpegError::NoVideoStream(path.to_path_buf()))
    }

    /// Decode every `step`th frame as 8-bit grayscale, stopping after `max_frames`.
    ///
    /// Frames are returned in presentation order; `GrayFrame::index` is the
    /// source frame number.
    pub async fn sample_frames(
        &self,
        path: &Path,
        props: &VideoProperties,
        step: u64,
        max_frames: usize,
    ) -> Result<Vec<GrayFrame>, FfmpegError> {
        let frame_len = props.width as usize * props.height as usize;
        if frame_len == 0 {
            return Err(FfmpegError::NoVideoStream(path.to_path_buf()));
        }
        let step = step.max(1);

        let mut child = tokio::process::Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .arg("-vf")
            .arg(format!("select=not(mod(n\\,{step}))"))
            .args([
                "-vsync",
                "vfr",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "gray",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FfmpegError::NotFound {
                binary: self.ffmpeg.display().to_string(),
                source,
            })?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            FfmpegError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "ffmpeg stdout unavailable",
            ))
        })?;
        // ffmpeg stalls once the stderr pipe is full, so it is read concurrently.
        let stderr_tail = tokio::spawn(drain_tail(child.stderr.take()));

        let mut frames = Vec::new();
        while frames.len() < max_frames {
            let mut pixels = vec![0u8; frame_len];
            match stdout.read_exact(&mut pixels).await {
                Ok(_) => {
                    let index = frames.len() as u64 * step;
                    let frame = GrayFrame::from_raw(index, props.width, props.height, pixels)
                        .ok_or_else(|| {
                            FfmpegError::ParseError(format!("frame {index} has the wrong size"))
                        })?;
                    frames.push(frame);
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(FfmpegError::Io(e)),
            }
        }
        drop(stdout);

        if frames.len() >= max_frames {
            // Enough samples; the rest of the stream is not needed.
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "ffmpeg exited before it could be killed");
            }
            if let Err(e) = child.wait().await {
                tracing::debug!(error = %e, "Failed to reap ffmpeg");
            }
            stderr_tail.abort();
            return Ok(frames);
        }

        let status = child.wait().await?;
        if !status.success() && frames.is_empty() {
            return Err(FfmpegError::ExecutionFailed {
                binary: self.ffmpeg.display().to_string(),
                exit_code: status.code(),
                stderr: stderr_tail.await.unwrap_or_default(),
            });
        }
        Ok(frames)
    }
}

/// Read a child's stderr to EOF, keeping only the last few kilobytes.
async fn drain_tail(stderr: Option<ChildStderr>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut tail = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

fn properties_from_probe(probe: &FfprobeOutput) -> Option<VideoProperties> {
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);
    let duration = stream
        .duration
        .as_deref()
        .or_else(|| probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or_else(|| (duration * fps).round() as u64);
    let duration_seconds = if fps > 0.0 {
        frame_count as f64 / fps
    } else {
        duration
    };

    Some(VideoProperties {
        width,
        height,
        fps,
        frame_count,
        duration_seconds,
    })
}

/// Parse an ffprobe rational such as "30000/1001".
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den != 0.0 && num > 0.0).then(|| num / den)
}
