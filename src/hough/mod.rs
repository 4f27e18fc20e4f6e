//! Deterministic progressive Hough transform.
//!
//! 1. Every edge pixel votes into a 1° × 1 px `(θ, ρ)` accumulator.
//! 2. Local maxima with at least `threshold` votes are visited strongest
//!    first (ties by θ, then ρ), so the output does not depend on any
//!    random sampling order.
//! 3. For each peak the line is walked across the map, collecting edge
//!    pixels not claimed by earlier segments within ±1 px of the line.
//!    Runs split where more than `max_line_gap` consecutive steps miss.
//! 4. Runs at least `min_line_length` long become segments and claim their
//!    pixels. Extraction stops after `max_lines` segments.

pub mod accumulator;
mod walk;

pub use accumulator::{HoughAccumulator, HoughPeak, THETA_BINS};

use crate::edges::EdgeMap;
use crate::segments::LineSegment;
use log::debug;
use serde::{Deserialize, Serialize};
use walk::LineWalker;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoughParams {
    /// Minimum accumulator votes for a peak.
    pub threshold: u32,
    pub min_line_length: f32,
    /// Largest number of consecutive missing pixels bridged inside a segment.
    pub max_line_gap: u32,
    pub max_lines: usize,
}

/// Extract line segments from a binary edge map, in crop-local coordinates.
pub fn extract_segments(edges: &EdgeMap, params: &HoughParams) -> Vec<LineSegment> {
    let mut segments = Vec::new();
    if params.max_lines == 0 || edges.count() == 0 {
        return segments;
    }
    let acc = HoughAccumulator::from_edges(edges);
    let peaks = acc.peaks(params.threshold);
    let mut walker = LineWalker::new(edges);
    for peak in &peaks {
        if segments.len() >= params.max_lines {
            break;
        }
        walker.walk(&acc, peak, params, &mut segments);
    }
    debug!(
        "hough: {} edge pixels, {} peaks -> {} segments",
        edges.count(),
        peaks.len(),
        segments.len()
    );
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn params() -> HoughParams {
        HoughParams {
            threshold: 20,
            min_line_length: 15.0,
            max_line_gap: 3,
            max_lines: 20,
        }
    }

    #[test]
    fn single_column_becomes_one_vertical_segment() {
        let mut edges = EdgeMap::new(48, 40);
        for y in 2..38 {
            edges.mark(20, y);
        }
        let segments = extract_segments(&edges, &params());
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        assert_abs_diff_eq!(seg.angle_deg, 90.0, epsilon = 1e-4);
        assert_abs_diff_eq!(seg.length, 35.0, epsilon = 1e-4);
        assert_eq!(seg.support, 36);
    }

    #[test]
    fn gaps_wider_than_allowed_split_the_line() {
        let mut edges = EdgeMap::new(40, 80);
        for y in (2..30).chain(40..75) {
            edges.mark(10, y);
        }
        let mut p = params();
        p.max_line_gap = 5;
        let segments = extract_segments(&edges, &p);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| (s.angle_deg - 90.0).abs() < 1e-3));

        p.max_line_gap = 12;
        let segments = extract_segments(&edges, &p);
        assert_eq!(segments.len(), 1);
        assert_abs_diff_eq!(segments[0].length, 72.0, epsilon = 1e-4);
    }

    #[test]
    fn short_runs_are_discarded() {
        let mut edges = EdgeMap::new(40, 40);
        for y in 0..30 {
            edges.mark(10, y);
        }
        let mut p = params();
        p.min_line_length = 35.0;
        assert!(extract_segments(&edges, &p).is_empty());
    }

    #[test]
    fn output_is_capped_and_repeatable() {
        let mut edges = EdgeMap::new(120, 60);
        for x in (5..115).step_by(5) {
            for y in 5..55 {
                edges.mark(x, y);
            }
        }
        let mut p = params();
        p.max_lines = 4;
        let first = extract_segments(&edges, &p);
        assert_eq!(first.len(), 4);
        assert_eq!(first, extract_segments(&edges, &p));
    }
}
