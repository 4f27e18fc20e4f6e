//! Per-pass diagnostics returned alongside a [`Decision`].
//!
//! The pipeline only needs the decision; tools and tests that want to see
//! where time went or how many edges survived use [`DetectionReport`].

pub mod timing;

pub use timing::{elapsed_ms, StageTiming, TimingBreakdown};

use crate::detector::Decision;
use crate::roi::PixelBounds;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub decision: Decision,
    /// Clipped region in frame pixels; `None` when the region was empty.
    pub roi_bounds: Option<PixelBounds>,
    /// Edge pixels that survived hysteresis and masking.
    pub edge_pixels: usize,
    pub timing: TimingBreakdown,
}
