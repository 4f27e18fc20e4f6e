use crate::angle::segment_angle_deg;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Straight segment in frame pixel coordinates.
///
/// `angle_deg` follows the y-up convention of [`crate::angle`] and lies in
/// [0, 180).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSegment {
    pub p0: [f32; 2],
    pub p1: [f32; 2],
    pub angle_deg: f32,
    pub length: f32,
    /// Edge pixels that supported the segment.
    pub support: u32,
}

impl LineSegment {
    pub fn new(p0: [f32; 2], p1: [f32; 2]) -> Self {
        let length = (Vector2::from(p1) - Vector2::from(p0)).norm();
        Self {
            p0,
            p1,
            angle_deg: segment_angle_deg(p0, p1),
            length,
            support: 0,
        }
    }

    pub fn with_support(mut self, support: u32) -> Self {
        self.support = support;
        self
    }

    /// Translate both endpoints, e.g. from crop-local to frame coordinates.
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            p0: [self.p0[0] + dx, self.p0[1] + dy],
            p1: [self.p1[0] + dx, self.p1[1] + dy],
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn derived_fields_follow_endpoints() {
        let seg = LineSegment::new([10.0, 0.0], [10.0, 25.0]);
        assert_abs_diff_eq!(seg.length, 25.0);
        assert_abs_diff_eq!(seg.angle_deg, 90.0, epsilon = 1e-4);
    }

    #[test]
    fn offset_keeps_geometry() {
        let seg = LineSegment::new([0.0, 0.0], [3.0, 4.0]).with_support(5);
        let moved = seg.offset(100.0, 50.0);
        assert_eq!(moved.p0, [100.0, 50.0]);
        assert_eq!(moved.p1, [103.0, 54.0]);
        assert_eq!(moved.length, seg.length);
        assert_eq!(moved.angle_deg, seg.angle_deg);
        assert_eq!(moved.support, 5);
    }
}
