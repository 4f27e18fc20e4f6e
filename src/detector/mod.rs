//! Line detection and angle classification.
//!
//! [`detect`] runs one pass over a frame:
//!
//! 1. validate the frame and clip the region of interest (empty → `NoSignal`),
//! 2. convert the region to luminance and extract Canny-style edges,
//! 3. find straight segments with a deterministic progressive Hough transform,
//! 4. pick the representative segment and classify its angle against the
//!    tolerance and defect bands.
//!
//! Settings live in [`params`]; the result type in [`decision`].

pub mod decision;
mod engine;
pub mod params;

pub use decision::{Decision, DecisionKind};
pub use engine::{detect, detect_with_report, DetectError};
pub use params::{DetectionSettings, GapPolicy, PerformanceProfile, SettingsError};
