// crates/core/src/backend.rs
//! AnalysisBackend trait defining the interface for pluggable analyzers.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::storage::MediaReference;

/// A named, swappable analysis implementation.
///
/// Backends are stateless per invocation and shared as `Arc<dyn AnalysisBackend>`
/// across every in-flight job. Implementations include:
/// - `DummyBackend`: simulated latency, synthetic result
/// - `MotionEdgeBackend`: motion and edge statistics over sampled frames
/// - `RailwayDetectionBackend`: track, train and obstacle heuristics
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Registry key (e.g. "dummy", "opencv_basic").
    fn name(&self) -> &str;

    /// Analyze the stored media and return a structured result.
    async fn run(&self, media: &MediaReference) -> Result<serde_json::Value, BackendError>;
}
