//! Double-threshold hysteresis that turns a thinned magnitude into a binary
//! edge map.
use crate::edges::EdgeMap;
use crate::image::{ImageF32, ImageView};
use crate::roi::RoiMask;

/// Keep every ridge pixel `>= high`, plus ridge pixels `>= low` that are
/// 8-connected to one of those. Pixels outside `mask` never become edges.
pub fn hysteresis(thin: &ImageF32, low: f32, high: f32, mask: Option<&RoiMask>) -> EdgeMap {
    let (w, h) = (thin.w, thin.h);
    let mut map = EdgeMap::new(w, h);
    if thin.is_empty() {
        return map;
    }
    let allowed = |x: usize, y: usize| mask.map_or(true, |m| m.contains(x, y));

    let mut stack: Vec<(usize, usize)> = Vec::new();
    for y in 0..h {
        let row = thin.row(y);
        for (x, &v) in row.iter().enumerate() {
            if v > 0.0 && v >= high && allowed(x, y) && map.mark(x, y) {
                stack.push((x, y));
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        let y_lo = y.saturating_sub(1);
        let y_hi = (y + 1).min(h - 1);
        let x_lo = x.saturating_sub(1);
        let x_hi = (x + 1).min(w - 1);
        for ny in y_lo..=y_hi {
            for nx in x_lo..=x_hi {
                let v = thin.get(nx, ny);
                if v > 0.0 && v >= low && allowed(nx, ny) && map.mark(nx, ny) {
                    stack.push((nx, ny));
                }
            }
        }
    }

    map
}
