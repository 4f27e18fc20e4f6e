//! Canny-style edge extraction for the line detector.
//!
//! Stages, each in its own module:
//!
//! - optional 5-tap Gaussian smoothing ([`blur`]),
//! - Sobel gradients with clamped borders ([`grad`]),
//! - non-maximum suppression along the gradient direction ([`nms`]),
//! - double-threshold hysteresis with 8-connectivity ([`hysteresis`]).
//!
//! All stages work on the luminance crop of the region of interest and keep
//! the 0..255 intensity scale, so the thresholds are comparable to those
//! used by common Canny implementations.

pub mod blur;
pub mod grad;
pub mod hysteresis;
pub mod nms;

pub use blur::{gaussian_blur, GAUSSIAN_5TAP};
pub use grad::{sobel_gradients, Grad};
pub use hysteresis::hysteresis;
pub use nms::suppress_non_maxima;

use crate::image::{ImageF32, ImageU8};
use crate::roi::RoiMask;
use serde::{Deserialize, Serialize};

/// Parameters of the edge stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    pub canny_low: f32,
    pub canny_high: f32,
    pub blur: bool,
}

/// Binary edge map in crop-local coordinates. Edge pixels are 255.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeMap {
    pub w: usize,
    pub h: usize,
    data: Vec<u8>,
    count: usize,
}

impl EdgeMap {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0; w * h],
            count: 0,
        }
    }

    #[inline]
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        self.data[y * self.w + x] != 0
    }

    /// Marks `(x, y)`; returns `false` if it was already set.
    #[inline]
    pub fn mark(&mut self, x: usize, y: usize) -> bool {
        let cell = &mut self.data[y * self.w + x];
        if *cell != 0 {
            return false;
        }
        *cell = 255;
        self.count += 1;
        true
    }

    /// Number of edge pixels.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Iterate edge pixel coordinates in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.w;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(move |(i, _)| (i % w, i / w))
    }

    pub fn as_view(&self) -> ImageU8<'_> {
        ImageU8 {
            w: self.w,
            h: self.h,
            stride: self.w,
            data: &self.data,
        }
    }
}

/// Run the full edge stage on a luminance crop.
pub fn detect_edges(luma: &ImageF32, mask: Option<&RoiMask>, params: &EdgeParams) -> EdgeMap {
    let grad = if params.blur {
        sobel_gradients(&gaussian_blur(luma))
    } else {
        sobel_gradients(luma)
    };
    let thin = suppress_non_maxima(&grad, params.canny_low);
    hysteresis(&thin, params.canny_low, params.canny_high, mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_step_yields_single_column() {
        let (w, h) = (32, 24);
        let mut luma = ImageF32::new(w, h);
        for y in 0..h {
            for x in 16..w {
                luma.set(x, y, 220.0);
            }
            for x in 0..16 {
                luma.set(x, y, 40.0);
            }
        }
        let params = EdgeParams {
            canny_low: 50.0,
            canny_high: 150.0,
            blur: true,
        };
        let map = detect_edges(&luma, None, &params);
        let columns: std::collections::BTreeSet<usize> = map.pixels().map(|(x, _)| x).collect();
        assert_eq!(columns.len(), 1, "columns: {columns:?}");
        let x = *columns.iter().next().unwrap();
        assert!((15..=16).contains(&x));
        // Every interior row carries the edge.
        assert_eq!(map.count(), h - 2);
        assert_eq!(map.as_view().count_nonzero(), map.count());
    }

    #[test]
    fn flat_image_has_no_edges() {
        let luma = ImageF32::from_vec(16, 16, vec![128.0; 256]).unwrap();
        let params = EdgeParams {
            canny_low: 10.0,
            canny_high: 20.0,
            blur: false,
        };
        assert_eq!(detect_edges(&luma, None, &params).count(), 0);
    }
}
