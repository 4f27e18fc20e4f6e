//! Angle utilities shared by the detector and the classifier.
//!
//! All angles are expressed in degrees. A line has no direction, so the
//! canonical range is the half-open interval [0, 180): an angle `a` and
//! `a + 180` describe the same line.
//!
//! The convention is counter-clockwise from the +x axis with the y axis
//! pointing up. A vertical board edge therefore measures 90°, a horizontal
//! one 0°.

use crate::detector::{DetectionSettings, GapPolicy};
use serde::{Deserialize, Serialize};

/// Period of an undirected line orientation.
pub const HALF_TURN_DEG: f32 = 180.0;

const SNAP_EPS_DEG: f32 = 1e-4;

/// Normalizes an angle into the range [0, 180).
///
/// Values that land within `1e-4` of 180 are snapped to 0 so that nearly
/// horizontal lines do not straddle the wrap point.
#[inline]
pub fn normalize_angle_deg(angle: f32) -> f32 {
    let norm = angle.rem_euclid(HALF_TURN_DEG);
    if norm >= HALF_TURN_DEG - SNAP_EPS_DEG {
        0.0
    } else {
        norm
    }
}

/// Smallest unsigned difference between two line orientations.
///
/// Operates in the 180°-periodic space, so the result lies in [0, 90].
#[inline]
pub fn angular_distance_deg(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs().rem_euclid(HALF_TURN_DEG);
    if diff > HALF_TURN_DEG * 0.5 {
        HALF_TURN_DEG - diff
    } else {
        diff
    }
}

/// Orientation of the line through `p0` and `p1` given in image pixel
/// coordinates (y pointing down).
#[inline]
pub fn segment_angle_deg(p0: [f32; 2], p1: [f32; 2]) -> f32 {
    let dx = p1[0] - p0[0];
    let dy = p1[1] - p0[1];
    // Flip y so the result follows the y-up convention.
    normalize_angle_deg((-dy).atan2(dx).to_degrees())
}

/// Outcome of classifying a single angle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Aligned,
    Misaligned,
}

/// Which rule produced an [`AngleClass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassReason {
    /// Within `tolerance` of the standard angle.
    WithinTolerance,
    /// Inside the inclusive defect band.
    DefectBand,
    /// Neither band matched; the gap policy decided.
    OutsideBands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleClass {
    pub alignment: Alignment,
    pub reason: ClassReason,
}

impl AngleClass {
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.alignment == Alignment::Aligned
    }
}

/// Classifies a measured angle against the tolerance and defect bands.
///
/// The tolerance check wins over the defect band and both bounds are
/// inclusive. Angles that fall in neither band follow
/// [`DetectionSettings::gap_policy`].
pub fn classify(angle: f32, settings: &DetectionSettings) -> AngleClass {
    let angle = normalize_angle_deg(angle);
    let deviation = angular_distance_deg(angle, settings.standard_angle_deg);
    if deviation <= settings.tolerance_deg {
        return AngleClass {
            alignment: Alignment::Aligned,
            reason: ClassReason::WithinTolerance,
        };
    }
    if angle >= settings.defect_min_deg && angle <= settings.defect_max_deg {
        return AngleClass {
            alignment: Alignment::Misaligned,
            reason: ClassReason::DefectBand,
        };
    }
    let alignment = match settings.gap_policy {
        GapPolicy::Misaligned => Alignment::Misaligned,
        GapPolicy::Aligned => Alignment::Aligned,
    };
    AngleClass {
        alignment,
        reason: ClassReason::OutsideBands,
    }
}
