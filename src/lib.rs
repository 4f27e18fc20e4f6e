#![doc = include_str!("../README.md")]

// Detection core.
pub mod angle;
pub mod detector;
pub mod diagnostics;
pub mod edges;
pub mod frame;
pub mod hough;
pub mod image;
pub mod roi;
pub mod segments;

// Runtime around the detector.
pub mod config;
pub mod logger;
pub mod pipeline;
pub mod relay;
pub mod report;
pub mod source;

// --- High-level re-exports -------------------------------------------------

pub use crate::angle::{classify, normalize_angle_deg, Alignment, AngleClass};
pub use crate::detector::{
    detect, detect_with_report, Decision, DecisionKind, DetectError, DetectionSettings, GapPolicy,
    PerformanceProfile,
};
pub use crate::diagnostics::DetectionReport;
pub use crate::frame::{Frame, PixelFormat};
pub use crate::roi::RegionOfInterest;
pub use crate::segments::LineSegment;

// --- Prelude ---------------------------------------------------------------

/// Everything needed to inspect a single frame.
///
/// ```no_run
/// use board_align::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let frame = board_align::image::load_frame(std::path::Path::new("board.png"))?;
/// let roi = RegionOfInterest::from_corners([100, 50], [300, 400]);
/// let decision = detect(&frame, &roi, &DetectionSettings::default())?;
/// println!("{:?} at {:?}°", decision.kind, decision.angle_deg);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::{
        detect, Decision, DecisionKind, DetectionSettings, Frame, PixelFormat, RegionOfInterest,
    };
}
