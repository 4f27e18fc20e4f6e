//! Line segments produced by the Hough extractor and helpers to rank them.

pub mod segment;

pub use segment::LineSegment;

use crate::angle::angular_distance_deg;

/// Segment that stands for the board edge in a detection pass.
///
/// The longest segment wins. Ties go to the smaller angular distance from
/// `standard_deg`, then to the earlier segment.
pub fn representative_segment(segments: &[LineSegment], standard_deg: f32) -> Option<&LineSegment> {
    segments.iter().min_by(|a, b| {
        b.length
            .total_cmp(&a.length)
            .then_with(|| {
                let da = angular_distance_deg(a.angle_deg, standard_deg);
                let db = angular_distance_deg(b.angle_deg, standard_deg);
                da.total_cmp(&db)
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_segment_is_representative() {
        let segments = vec![
            LineSegment::new([0.0, 0.0], [0.0, 30.0]),
            LineSegment::new([0.0, 0.0], [40.0, 0.0]),
            LineSegment::new([5.0, 5.0], [15.0, 5.0]),
        ];
        let rep = representative_segment(&segments, 90.0).unwrap();
        assert_eq!(rep.length, 40.0);
    }

    #[test]
    fn ties_prefer_closest_to_standard_then_order() {
        let segments = vec![
            LineSegment::new([0.0, 0.0], [30.0, 0.0]),
            LineSegment::new([50.0, 0.0], [50.0, 30.0]),
            LineSegment::new([60.0, 0.0], [60.0, 30.0]),
        ];
        let rep = representative_segment(&segments, 90.0).unwrap();
        assert_eq!(rep.p0, [50.0, 0.0]);

        let rep = representative_segment(&segments, 0.0).unwrap();
        assert_eq!(rep.p0, [0.0, 0.0]);
    }

    #[test]
    fn empty_input_has_no_representative() {
        assert!(representative_segment(&[], 90.0).is_none());
    }
}
