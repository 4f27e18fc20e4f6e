use crate::angle::{Alignment, AngleClass, ClassReason};
use crate::segments::LineSegment;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Aligned,
    Misaligned,
    /// No region selected or no usable line inside it.
    NoSignal,
}

impl From<Alignment> for DecisionKind {
    fn from(value: Alignment) -> Self {
        match value {
            Alignment::Aligned => DecisionKind::Aligned,
            Alignment::Misaligned => DecisionKind::Misaligned,
        }
    }
}

/// Result of one detection pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub kind: DecisionKind,
    /// Angle of the representative segment; absent for `NoSignal`.
    pub angle_deg: Option<f32>,
    /// Distance of `angle_deg` from the standard angle.
    pub deviation_deg: Option<f32>,
    pub reason: Option<ClassReason>,
    /// Every segment found, in extraction order, frame coordinates.
    pub segments: Vec<LineSegment>,
    pub elapsed_ms: f64,
}

impl Decision {
    pub fn no_signal(segments: Vec<LineSegment>, elapsed_ms: f64) -> Self {
        Self {
            kind: DecisionKind::NoSignal,
            angle_deg: None,
            deviation_deg: None,
            reason: None,
            segments,
            elapsed_ms,
        }
    }

    pub fn classified(
        angle_deg: f32,
        deviation_deg: f32,
        class: AngleClass,
        segments: Vec<LineSegment>,
        elapsed_ms: f64,
    ) -> Self {
        Self {
            kind: class.alignment.into(),
            angle_deg: Some(angle_deg),
            deviation_deg: Some(deviation_deg),
            reason: Some(class.reason),
            segments,
            elapsed_ms,
        }
    }

    #[inline]
    pub fn is_misaligned(&self) -> bool {
        self.kind == DecisionKind::Misaligned
    }

    /// Same outcome, ignoring how long the pass took.
    pub fn same_outcome(&self, other: &Decision) -> bool {
        self.kind == other.kind
            && self.angle_deg == other.angle_deg
            && self.reason == other.reason
            && self.segments == other.segments
    }
}
