//! Gradient-orthogonality sub-pixel corner refinement.
//!
//! At a saddle point every image gradient in the neighbourhood is orthogonal
//! to the vector from the corner to the sample. Each iteration solves the
//! weighted least-squares system
//!
//! `sum(w g gᵀ) q = sum(w g gᵀ p)`
//!
//! over a `(2h+1)²` window centred on the current estimate `q`.

use camcal_core::{sample_bilinear, GrayImageView, Pt2};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::CornerRefiner;

/// Stop after `max_iters` iterations or once the update falls below
/// `epsilon` pixels, whichever comes first.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermCriteria {
    pub max_iters: usize,
    pub epsilon: f64,
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            max_iters: 30,
            epsilon: 0.001,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half side of the search window; 5 gives an 11x11 window.
    pub half_window: usize,
    pub criteria: TermCriteria,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            criteria: TermCriteria::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SubPixRefiner;

impl CornerRefiner for SubPixRefiner {
    fn refine(
        &self,
        image: &GrayImageView<'_>,
        corners: &[Pt2],
        params: &SubPixParams,
    ) -> Vec<Pt2> {
        corners
            .iter()
            .map(|&c| refine_corner(image, c, params))
            .collect()
    }
}

fn refine_corner(image: &GrayImageView<'_>, start: Pt2, params: &SubPixParams) -> Pt2 {
    let hw = params.half_window as i64;
    if hw == 0 {
        return start;
    }
    let sigma2 = (hw as f64 * 0.5).powi(2).max(0.25);

    let mut q = start;
    for _ in 0..params.criteria.max_iters.max(1) {
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();

        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let px = q.x + dx as f64;
                let py = q.y + dy as f64;
                let gx = 0.5
                    * (sample_bilinear(image, px + 1.0, py) - sample_bilinear(image, px - 1.0, py));
                let gy = 0.5
                    * (sample_bilinear(image, px, py + 1.0) - sample_bilinear(image, px, py - 1.0));
                let w = (-((dx * dx + dy * dy) as f64) / (2.0 * sigma2)).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b[0] += gxx * px + gxy * py;
                b[1] += gxy * px + gyy * py;
            }
        }

        // flat or single-edge neighbourhood
        if a.determinant().abs() < 1e-9 * (a.trace() * a.trace()).max(1e-12) {
            break;
        }
        let Some(a_inv) = a.try_inverse() else {
            break;
        };
        let next = a_inv * b;
        let shift = (next - q.coords).norm();
        q = Pt2::from(next);
        if shift <= params.criteria.epsilon {
            break;
        }
    }

    // a corner that wandered out of its window is not trusted
    let escaped = (q.x - start.x).abs() > hw as f64 || (q.y - start.y).abs() > hw as f64;
    if escaped || !q.x.is_finite() || !q.y.is_finite() {
        log::trace!(
            "refinement left the search window at ({:.2}, {:.2})",
            start.x,
            start.y
        );
        return start;
    }
    q
}
