//! Vote accumulator over `(θ, ρ)` with 1° and 1 px resolution.
//!
//! A pixel `(x, y)` votes for every line `x·cosθ + y·sinθ = ρ` through it,
//! θ in [0°, 180°).
use crate::edges::EdgeMap;
use nalgebra::Vector2;

pub const THETA_BINS: usize = 180;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoughPeak {
    /// θ in whole degrees.
    pub theta_idx: usize,
    pub rho: i32,
    pub votes: u32,
}

pub struct HoughAccumulator {
    rho_offset: i32,
    rho_bins: usize,
    votes: Vec<u32>,
    trig: Vec<(f32, f32)>,
}

impl HoughAccumulator {
    pub fn new(width: usize, height: usize) -> Self {
        let diag = (width as f32).hypot(height as f32).ceil() as i32;
        let rho_bins = (2 * diag + 1) as usize;
        let trig = (0..THETA_BINS)
            .map(|k| {
                let theta = (k as f32).to_radians();
                (theta.cos(), theta.sin())
            })
            .collect();
        Self {
            rho_offset: diag,
            rho_bins,
            votes: vec![0; THETA_BINS * rho_bins],
            trig,
        }
    }

    /// Accumulate votes for every edge pixel of `edges`.
    pub fn from_edges(edges: &EdgeMap) -> Self {
        let mut acc = Self::new(edges.w, edges.h);
        for (x, y) in edges.pixels() {
            acc.vote(x, y);
        }
        acc
    }

    pub fn vote(&mut self, x: usize, y: usize) {
        let (xf, yf) = (x as f32, y as f32);
        for (k, &(c, s)) in self.trig.iter().enumerate() {
            let rho = (xf * c + yf * s).round() as i32;
            let idx = self.cell(k, rho);
            self.votes[idx] += 1;
        }
    }

    #[inline]
    fn cell(&self, theta_idx: usize, rho: i32) -> usize {
        theta_idx * self.rho_bins + (rho + self.rho_offset) as usize
    }

    pub fn votes(&self, theta_idx: usize, rho: i32) -> u32 {
        let r = rho + self.rho_offset;
        if theta_idx >= THETA_BINS || r < 0 || r as usize >= self.rho_bins {
            return 0;
        }
        self.votes[self.cell(theta_idx, rho)]
    }

    /// Local maxima (3×3, no wrap) with at least `threshold` votes, ordered
    /// by votes descending, then θ, then ρ.
    pub fn peaks(&self, threshold: u32) -> Vec<HoughPeak> {
        let threshold = threshold.max(1);
        let mut peaks = Vec::new();
        for theta_idx in 0..THETA_BINS {
            let row = &self.votes[theta_idx * self.rho_bins..(theta_idx + 1) * self.rho_bins];
            for (r, &votes) in row.iter().enumerate() {
                if votes < threshold {
                    continue;
                }
                let rho = r as i32 - self.rho_offset;
                if self.is_local_max(theta_idx, rho, votes) {
                    peaks.push(HoughPeak {
                        theta_idx,
                        rho,
                        votes,
                    });
                }
            }
        }
        peaks.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then(a.theta_idx.cmp(&b.theta_idx))
                .then(a.rho.cmp(&b.rho))
        });
        peaks
    }

    fn is_local_max(&self, theta_idx: usize, rho: i32, votes: u32) -> bool {
        let t_lo = theta_idx.saturating_sub(1);
        let t_hi = (theta_idx + 1).min(THETA_BINS - 1);
        (t_lo..=t_hi).all(|t| (rho - 1..=rho + 1).all(|r| self.votes(t, r) <= votes))
    }

    /// Unit normal of the peak's line.
    pub fn normal(&self, peak: &HoughPeak) -> Vector2<f32> {
        let (c, s) = self.trig[peak.theta_idx];
        Vector2::new(c, s)
    }
}
