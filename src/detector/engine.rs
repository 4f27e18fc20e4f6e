//! A single detection pass: frame + region + settings in, decision out.
//!
//! The pass has no side effects besides a debug log line, so identical
//! inputs always produce the same decision.
use super::{Decision, DetectionSettings};
use crate::angle::{angular_distance_deg, classify};
use crate::diagnostics::{elapsed_ms, DetectionReport, TimingBreakdown};
use crate::edges::detect_edges;
use crate::frame::{Frame, PixelFormat};
use crate::hough::extract_segments;
use crate::roi::RegionOfInterest;
use crate::segments::{representative_segment, LineSegment};
use log::debug;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("invalid frame: {width}x{height} {format:?} needs {expected} bytes, got {actual}")]
    InvalidFrame {
        width: usize,
        height: usize,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

/// Measure the board angle inside `roi` and classify it.
pub fn detect(
    frame: &Frame,
    roi: &RegionOfInterest,
    settings: &DetectionSettings,
) -> Result<Decision, DetectError> {
    detect_with_report(frame, roi, settings).map(|report| report.decision)
}

/// Like [`detect`], also returning stage timings and edge statistics.
pub fn detect_with_report(
    frame: &Frame,
    roi: &RegionOfInterest,
    settings: &DetectionSettings,
) -> Result<DetectionReport, DetectError> {
    let start = Instant::now();
    if !frame.is_valid() {
        return Err(DetectError::InvalidFrame {
            width: frame.width(),
            height: frame.height(),
            format: frame.format(),
            expected: frame.expected_len(),
            actual: frame.data().len(),
        });
    }

    let mut timing = TimingBreakdown::default();
    let Some(mask) = roi.clip(frame.width(), frame.height()) else {
        let total = elapsed_ms(start);
        timing.total_ms = total;
        return Ok(DetectionReport {
            decision: Decision::no_signal(Vec::new(), total),
            roi_bounds: None,
            edge_pixels: 0,
            timing,
        });
    };
    let bounds = mask.bounds;

    let luma = timing.measure("luma", || frame.luma_crop(&bounds));
    let edges = timing.measure("edges", || {
        detect_edges(&luma, Some(&mask), &settings.edge_params())
    });
    let segments: Vec<LineSegment> = timing.measure("hough", || {
        extract_segments(&edges, &settings.hough_params())
            .into_iter()
            .map(|s| s.offset(bounds.x0 as f32, bounds.y0 as f32))
            .collect()
    });

    let total = elapsed_ms(start);
    timing.total_ms = total;
    let decision = decide(segments, settings, total);
    debug!(
        "detect: frame #{} roi {}x{} edges={} segments={} -> {:?} angle={:?} ({:.2} ms)",
        frame.sequence(),
        bounds.width(),
        bounds.height(),
        edges.count(),
        decision.segments.len(),
        decision.kind,
        decision.angle_deg,
        total
    );
    Ok(DetectionReport {
        decision,
        roi_bounds: Some(bounds),
        edge_pixels: edges.count(),
        timing,
    })
}

fn decide(segments: Vec<LineSegment>, settings: &DetectionSettings, elapsed_ms: f64) -> Decision {
    let Some(angle) = representative_segment(&segments, settings.standard_angle_deg)
        .map(|s| s.angle_deg)
    else {
        return Decision::no_signal(segments, elapsed_ms);
    };
    let class = classify(angle, settings);
    let deviation = angular_distance_deg(angle, settings.standard_angle_deg);
    Decision::classified(angle, deviation, class, segments, elapsed_ms)
}
