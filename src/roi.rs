//! Operator-selected region of interest and its pixel mask.

use serde::{Deserialize, Serialize};

/// Regions narrower than this after clipping carry no usable edges: the
/// gradient and suppression stages need a 3×3 neighborhood.
pub const MIN_ROI_SIDE_PX: usize = 3;

const MIN_POLYGON_AREA_PX: f32 = 1.0;

/// Region in frame pixel coordinates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionOfInterest {
    /// Nothing selected; detection reports `NoSignal`.
    #[default]
    None,
    Rect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Polygon {
        points: Vec<[f32; 2]>,
    },
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)` inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelBounds {
    #[inline]
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }
}

/// A clipped region: its bounding box plus an optional per-pixel mask.
///
/// Rectangles need no mask; polygons store one flag per pixel of the
/// bounding box, tested at pixel centers.
#[derive(Clone, Debug, PartialEq)]
pub struct RoiMask {
    pub bounds: PixelBounds,
    inside: Option<Vec<bool>>,
}

impl RoiMask {
    /// Whether the crop-local pixel `(x, y)` belongs to the region.
    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        match &self.inside {
            None => x < self.bounds.width() && y < self.bounds.height(),
            Some(inside) => inside
                .get(y * self.bounds.width() + x)
                .copied()
                .unwrap_or(false),
        }
    }

    pub fn is_rectangular(&self) -> bool {
        self.inside.is_none()
    }
}

impl RegionOfInterest {
    /// Rectangle spanned by two opposite corners, in either order.
    pub fn from_corners(a: [i32; 2], b: [i32; 2]) -> Self {
        let x = a[0].min(b[0]);
        let y = a[1].min(b[1]);
        RegionOfInterest::Rect {
            x,
            y,
            width: (a[0] - b[0]).abs(),
            height: (a[1] - b[1]).abs(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RegionOfInterest::None)
    }

    /// Clip the region to a `width × height` frame.
    ///
    /// Returns `None` when nothing usable remains: no selection, zero area
    /// after clipping, a polygon with fewer than three vertices or no area.
    pub fn clip(&self, width: usize, height: usize) -> Option<RoiMask> {
        match self {
            RegionOfInterest::None => None,
            RegionOfInterest::Rect {
                x,
                y,
                width: rw,
                height: rh,
            } => {
                if *rw <= 0 || *rh <= 0 {
                    return None;
                }
                let x0 = i64::from(*x).max(0);
                let y0 = i64::from(*y).max(0);
                let x1 = (i64::from(*x) + i64::from(*rw)).min(width as i64);
                let y1 = (i64::from(*y) + i64::from(*rh)).min(height as i64);
                let bounds = checked_bounds(x0, y0, x1, y1)?;
                Some(RoiMask {
                    bounds,
                    inside: None,
                })
            }
            RegionOfInterest::Polygon { points } => clip_polygon(points, width, height),
        }
    }
}

fn checked_bounds(x0: i64, y0: i64, x1: i64, y1: i64) -> Option<PixelBounds> {
    if x1 - x0 < MIN_ROI_SIDE_PX as i64 || y1 - y0 < MIN_ROI_SIDE_PX as i64 {
        return None;
    }
    Some(PixelBounds {
        x0: x0 as usize,
        y0: y0 as usize,
        x1: x1 as usize,
        y1: y1 as usize,
    })
}

fn polygon_area(points: &[[f32; 2]]) -> f32 {
    let n = points.len();
    let twice: f32 = (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p[0] * q[1] - q[0] * p[1]
        })
        .sum();
    (twice * 0.5).abs()
}

/// Even-odd point-in-polygon test.
fn point_in_polygon(px: f32, py: f32, points: &[[f32; 2]]) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let [xi, yi] = points[i];
        let [xj, yj] = points[j];
        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn clip_polygon(points: &[[f32; 2]], width: usize, height: usize) -> Option<RoiMask> {
    if points.len() < 3 || points.iter().flatten().any(|v| !v.is_finite()) {
        return None;
    }
    if polygon_area(points) < MIN_POLYGON_AREA_PX {
        return None;
    }
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p[0]);
        min_y = min_y.min(p[1]);
        max_x = max_x.max(p[0]);
        max_y = max_y.max(p[1]);
    }
    let x0 = (min_x.floor() as i64).max(0);
    let y0 = (min_y.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64).min(width as i64);
    let y1 = (max_y.ceil() as i64).min(height as i64);
    let bounds = checked_bounds(x0, y0, x1, y1)?;

    let (w, h) = (bounds.width(), bounds.height());
    let mut inside = vec![false; w * h];
    let mut any = false;
    for ly in 0..h {
        let cy = (bounds.y0 + ly) as f32 + 0.5;
        for lx in 0..w {
            let cx = (bounds.x0 + lx) as f32 + 0.5;
            if point_in_polygon(cx, cy, points) {
                inside[ly * w + lx] = true;
                any = true;
            }
        }
    }
    any.then_some(RoiMask {
        bounds,
        inside: Some(inside),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_is_clipped_to_frame() {
        let roi = RegionOfInterest::Rect {
            x: -10,
            y: 5,
            width: 50,
            height: 500,
        };
        let mask = roi.clip(100, 80).unwrap();
        assert_eq!(
            mask.bounds,
            PixelBounds {
                x0: 0,
                y0: 5,
                x1: 40,
                y1: 80
            }
        );
        assert!(mask.is_rectangular());
        assert!(mask.contains(39, 74));
        assert!(!mask.contains(40, 0));
    }

    #[test]
    fn degenerate_regions_clip_to_nothing() {
        assert!(RegionOfInterest::None.clip(100, 100).is_none());
        let zero = RegionOfInterest::Rect {
            x: 10,
            y: 10,
            width: 0,
            height: 20,
        };
        assert!(zero.clip(100, 100).is_none());
        let outside = RegionOfInterest::Rect {
            x: 200,
            y: 10,
            width: 20,
            height: 20,
        };
        assert!(outside.clip(100, 100).is_none());
        let two_points = RegionOfInterest::Polygon {
            points: vec![[0.0, 0.0], [10.0, 10.0]],
        };
        assert!(two_points.clip(100, 100).is_none());
        let collinear = RegionOfInterest::Polygon {
            points: vec![[0.0, 0.0], [10.0, 10.0], [20.0, 20.0]],
        };
        assert!(collinear.clip(100, 100).is_none());
    }

    #[test]
    fn corners_in_any_order_give_same_rect() {
        assert_eq!(
            RegionOfInterest::from_corners([30, 40], [10, 5]),
            RegionOfInterest::Rect {
                x: 10,
                y: 5,
                width: 20,
                height: 35
            }
        );
    }

    #[test]
    fn polygon_mask_follows_outline() {
        // Right triangle with the hypotenuse from (0,20) to (20,0).
        let roi = RegionOfInterest::Polygon {
            points: vec![[0.0, 0.0], [20.0, 0.0], [0.0, 20.0]],
        };
        let mask = roi.clip(64, 64).unwrap();
        assert!(!mask.is_rectangular());
        assert_eq!(mask.bounds.width(), 20);
        assert!(mask.contains(1, 1));
        assert!(mask.contains(5, 10));
        assert!(!mask.contains(18, 18));
        assert!(!mask.contains(15, 10));
    }
}
