//! Walks a Hough line through the edge map and cuts it into segments.
use super::accumulator::{HoughAccumulator, HoughPeak};
use super::HoughParams;
use crate::edges::EdgeMap;
use crate::segments::LineSegment;
use nalgebra::Vector2;

struct Run {
    first: (usize, usize),
    last: (usize, usize),
    last_step: i64,
    hits: u32,
    pixels: Vec<(usize, usize)>,
}

impl Run {
    fn start(px: (usize, usize), step: i64, band: Vec<(usize, usize)>) -> Self {
        Self {
            first: px,
            last: px,
            last_step: step,
            hits: 1,
            pixels: band,
        }
    }

    fn extend(&mut self, px: (usize, usize), step: i64, band: Vec<(usize, usize)>) {
        self.last = px;
        self.last_step = step;
        self.hits += 1;
        self.pixels.extend(band);
    }

    fn length(&self) -> f32 {
        let dx = self.last.0 as f32 - self.first.0 as f32;
        let dy = self.last.1 as f32 - self.first.1 as f32;
        dx.hypot(dy)
    }
}

/// Edge map plus the pixels already claimed by emitted segments.
pub(crate) struct LineWalker<'a> {
    edges: &'a EdgeMap,
    consumed: Vec<bool>,
    half_span: i64,
}

impl<'a> LineWalker<'a> {
    pub(crate) fn new(edges: &'a EdgeMap) -> Self {
        Self {
            edges,
            consumed: vec![false; edges.w * edges.h],
            half_span: (edges.w as f32).hypot(edges.h as f32).ceil() as i64,
        }
    }

    fn free_edge(&self, p: Vector2<f32>) -> Option<(usize, usize)> {
        let (x, y) = (p.x.round(), p.y.round());
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.edges.w || y >= self.edges.h {
            return None;
        }
        (self.edges.is_edge(x, y) && !self.consumed[y * self.edges.w + x]).then_some((x, y))
    }

    /// Walk the line of `peak`, appending accepted segments to `out` until it
    /// holds `params.max_lines` entries.
    pub(crate) fn walk(
        &mut self,
        acc: &HoughAccumulator,
        peak: &HoughPeak,
        params: &HoughParams,
        out: &mut Vec<LineSegment>,
    ) {
        let normal = acc.normal(peak);
        let dir = Vector2::new(-normal.y, normal.x);
        let base = normal * peak.rho as f32;
        let max_gap = i64::from(params.max_line_gap);

        let mut run: Option<Run> = None;
        for step in -self.half_span..=self.half_span {
            if out.len() >= params.max_lines {
                return;
            }
            let p = base + dir * step as f32;
            // ±1 px tolerance across the line, centre first.
            let band: Vec<(usize, usize)> = [p, p - normal, p + normal]
                .into_iter()
                .filter_map(|q| self.free_edge(q))
                .collect();
            let Some(&px) = band.first() else {
                continue;
            };
            let extends = run
                .as_ref()
                .is_some_and(|r| step - r.last_step - 1 <= max_gap);
            if extends {
                if let Some(r) = run.as_mut() {
                    r.extend(px, step, band);
                }
            } else {
                if let Some(done) = run.take() {
                    self.close(done, params, out);
                }
                run = Some(Run::start(px, step, band));
            }
        }
        if let Some(done) = run.take() {
            if out.len() < params.max_lines {
                self.close(done, params, out);
            }
        }
    }

    fn close(&mut self, run: Run, params: &HoughParams, out: &mut Vec<LineSegment>) {
        if out.len() >= params.max_lines || run.length() < params.min_line_length {
            return;
        }
        for &(x, y) in &run.pixels {
            self.consumed[y * self.edges.w + x] = true;
        }
        let p0 = [run.first.0 as f32, run.first.1 as f32];
        let p1 = [run.last.0 as f32, run.last.1 as f32];
        out.push(LineSegment::new(p0, p1).with_support(run.hits));
    }
}
