//! Separable smoothing applied before gradient computation.
//!
//! Uses the binomial 5-tap kernel `[1, 4, 6, 4, 1] / 16` along rows and then
//! columns, replicating border pixels. Output has the input's size.
use crate::image::{ImageF32, ImageView, ImageViewMut};

/// A separable 1D kernel applied identically along both axes.
pub trait SeparableFilter {
    /// Taps in left-to-right order; the centre tap sits at `len / 2`.
    fn taps(&self) -> &[f32];
}

#[derive(Clone, Copy, Debug)]
pub struct StaticSeparableFilter {
    taps: &'static [f32],
}

impl StaticSeparableFilter {
    pub const fn new(taps: &'static [f32]) -> Self {
        Self { taps }
    }
}

impl Default for StaticSeparableFilter {
    fn default() -> Self {
        GAUSSIAN_5TAP
    }
}

impl SeparableFilter for StaticSeparableFilter {
    #[inline]
    fn taps(&self) -> &[f32] {
        self.taps
    }
}

/// Normalised 5-tap Gaussian filter `[1, 4, 6, 4, 1] / 16`.
pub const GAUSSIAN_5TAP: StaticSeparableFilter =
    StaticSeparableFilter::new(&[0.0625, 0.25, 0.375, 0.25, 0.0625]);

#[inline]
fn clamp_index(idx: isize, len: usize) -> usize {
    idx.clamp(0, len as isize - 1) as usize
}

/// Convolve `src` with `filter` horizontally, then vertically.
pub fn blur_separable(src: &ImageF32, filter: &dyn SeparableFilter) -> ImageF32 {
    let (w, h) = (src.w, src.h);
    let taps = filter.taps();
    if src.is_empty() || taps.is_empty() {
        return src.clone();
    }
    let radius = (taps.len() / 2) as isize;

    let mut horiz = ImageF32::new(w, h);
    for y in 0..h {
        let row = src.row(y);
        let out = horiz.row_mut(y);
        for (x, value) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &tap) in taps.iter().enumerate() {
                let sx = clamp_index(x as isize + k as isize - radius, w);
                acc += row[sx] * tap;
            }
            *value = acc;
        }
    }

    let mut out = ImageF32::new(w, h);
    for y in 0..h {
        for (k, &tap) in taps.iter().enumerate() {
            let sy = clamp_index(y as isize + k as isize - radius, h);
            let src_row = horiz.row(sy);
            let dst_row = out.row_mut(y);
            for (dst, &s) in dst_row.iter_mut().zip(src_row) {
                *dst += s * tap;
            }
        }
    }
    out
}

/// Gaussian pre-smoothing used by the detector.
pub fn gaussian_blur(src: &ImageF32) -> ImageF32 {
    blur_separable(src, &GAUSSIAN_5TAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn constant_image_is_unchanged() {
        let src = ImageF32::from_vec(7, 5, vec![42.0; 35]).unwrap();
        let out = gaussian_blur(&src);
        for v in out.data {
            assert_abs_diff_eq!(v, 42.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn step_is_smeared_symmetrically() {
        let mut src = ImageF32::new(12, 3);
        for y in 0..3 {
            for x in 6..12 {
                src.set(x, y, 255.0);
            }
        }
        let out = gaussian_blur(&src);
        assert_abs_diff_eq!(out.get(4, 1), 255.0 * 0.0625, epsilon = 1e-3);
        assert_abs_diff_eq!(out.get(5, 1), 255.0 * 0.3125, epsilon = 1e-3);
        assert_abs_diff_eq!(out.get(6, 1), 255.0 * 0.6875, epsilon = 1e-3);
        assert_abs_diff_eq!(out.get(7, 1), 255.0 * 0.9375, epsilon = 1e-3);
    }
}
