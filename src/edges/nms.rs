//! Non-maximum suppression on gradient magnitude along the gradient direction.
//!
//! The direction is quantized to 0°, 45°, 90° or 135° and each pixel is
//! compared with its two neighbors across the edge. The comparison is
//! asymmetric (`> first && >= second`), so a two-pixel plateau collapses to
//! a single-pixel ridge instead of vanishing.
//!
//! The outermost 1-pixel frame is always suppressed.
use crate::edges::grad::Grad;
use crate::image::{ImageF32, ImageView, ImageViewMut};

const TAN_22_5_DEG: f32 = 0.414_213_57;

/// Thinned magnitude: suppressed pixels are zero, ridge pixels keep their
/// gradient magnitude. Pixels below `floor` are suppressed as well.
pub fn suppress_non_maxima(grad: &Grad, floor: f32) -> ImageF32 {
    let w = grad.mag.w;
    let h = grad.mag.h;
    let mut thin = ImageF32::new(w, h);
    if w < 3 || h < 3 {
        return thin;
    }

    for y in 1..h - 1 {
        let mag_prev = grad.mag.row(y - 1);
        let mag_row = grad.mag.row(y);
        let mag_next = grad.mag.row(y + 1);
        let gx_row = grad.gx.row(y);
        let gy_row = grad.gy.row(y);
        let out = thin.row_mut(y);

        for x in 1..w - 1 {
            let mag = mag_row[x];
            if mag <= 0.0 || mag < floor {
                continue;
            }

            let gx = gx_row[x];
            let gy = gy_row[x];
            let abs_gx = gx.abs();
            let abs_gy = gy.abs();
            // Same sign: the gradient points along (1, 1) in image space.
            let same_sign = (gx >= 0.0) == (gy >= 0.0);

            let (before, after) = if abs_gy <= abs_gx * TAN_22_5_DEG {
                (mag_row[x - 1], mag_row[x + 1])
            } else if abs_gx <= abs_gy * TAN_22_5_DEG {
                (mag_prev[x], mag_next[x])
            } else if same_sign {
                (mag_prev[x - 1], mag_next[x + 1])
            } else {
                (mag_prev[x + 1], mag_next[x - 1])
            };

            if mag > before && mag >= after {
                out[x] = mag;
            }
        }
    }

    thin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::grad::sobel_gradients;

    #[test]
    fn plateau_collapses_to_single_ridge() {
        // A step of width two between columns 4 and 5 gives equal magnitudes
        // at x = 4 and x = 5.
        let mut img = ImageF32::new(10, 6);
        for y in 0..6 {
            for x in 5..10 {
                img.set(x, y, 200.0);
            }
        }
        let grad = sobel_gradients(&img);
        assert_eq!(grad.mag.get(4, 3), grad.mag.get(5, 3));
        let thin = suppress_non_maxima(&grad, 0.0);
        let ridge: Vec<usize> = (1..9).filter(|&x| thin.get(x, 3) > 0.0).collect();
        assert_eq!(ridge, vec![4]);
    }

    #[test]
    fn diagonal_edge_stays_thin() {
        let n = 24;
        let mut img = ImageF32::new(n, n);
        for y in 0..n {
            for x in 0..n {
                if x > y {
                    img.set(x, y, 180.0);
                }
            }
        }
        let thin = suppress_non_maxima(&sobel_gradients(&img), 0.0);
        for y in 4..n - 4 {
            let count = (1..n - 1).filter(|&x| thin.get(x, y) > 0.0).count();
            assert!(count <= 2, "row {y} has {count} ridge pixels");
            assert!(count >= 1, "row {y} lost its edge");
        }
    }
}
