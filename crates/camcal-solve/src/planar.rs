use camcal_core::{
    estimate_homography, CalibrationResult, Distortion, Mat3, Pt2, Real, Resolution, SampleSet,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::refine::{self, Estimate, LmOptions, ViewData};
use crate::{intrinsics_from_homographies, pose_from_homography, CalibrationSolver, SolveError};

/// Iteration limits for the joint refinement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub max_iters: usize,
    pub ftol: Real,
    pub gtol: Real,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-12,
            gtol: 1e-12,
        }
    }
}

/// Zhang initialisation followed by Levenberg-Marquardt over all parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanarSolver {
    pub options: SolverOptions,
}

impl PlanarSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

/// Fewest views the planar solver accepts.
pub const MIN_VIEWS: usize = 3;

impl CalibrationSolver for PlanarSolver {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, samples), fields(views = samples.len()))
    )]
    fn solve(
        &self,
        samples: &SampleSet,
        image_size: Resolution,
    ) -> Result<CalibrationResult, SolveError> {
        if image_size.is_empty() {
            return Err(SolveError::EmptyImage {
                width: image_size.width,
                height: image_size.height,
            });
        }
        if samples.len() < MIN_VIEWS {
            return Err(SolveError::NotEnoughViews {
                need: MIN_VIEWS,
                got: samples.len(),
            });
        }

        let planar = samples.pattern().planar_points();
        let homographies = samples
            .iter()
            .enumerate()
            .map(|(view, s)| {
                estimate_homography(&planar, s.image_points())
                    .map(|h| h.h)
                    .ok_or(SolveError::HomographyFailed { view })
            })
            .collect::<Result<Vec<Mat3>, _>>()?;

        let intrinsics = intrinsics_from_homographies(&homographies)?;
        let kmtx = intrinsics.matrix();
        let poses = homographies
            .iter()
            .map(|h| pose_from_homography(&kmtx, h))
            .collect::<Result<Vec<_>, _>>()?;

        let views: Vec<ViewData<'_>> = samples
            .iter()
            .map(|s| ViewData {
                object: s.object_points(),
                image: s.image_points(),
            })
            .collect();

        let initial = Estimate {
            intrinsics,
            distortion: Distortion::zero(),
            poses,
        };
        if let Some(rms) = refine::rms_error(&views, &initial) {
            log::debug!("closed-form estimate rms {rms:.4} px");
        }

        let outcome = refine::refine(
            &views,
            &initial,
            &LmOptions {
                max_iters: self.options.max_iters,
                ftol: self.options.ftol,
                gtol: self.options.gtol,
            },
        );
        log::debug!(
            "refinement: converged={} evaluations={} objective={:.3e}",
            outcome.converged,
            outcome.evaluations,
            outcome.objective
        );
        if !outcome.converged {
            log::warn!(
                "refinement stopped before convergence after {} evaluations",
                outcome.evaluations
            );
        }

        let est = outcome.estimate;
        let rms = refine::rms_error(&views, &est)
            .ok_or_else(|| SolveError::Diverged("board projects behind the camera".into()))?;

        let k = &est.intrinsics;
        if !(k.is_finite() && est.distortion.is_finite() && rms.is_finite()) {
            return Err(SolveError::Diverged("non-finite parameters".into()));
        }
        if k.fx <= 0.0 || k.fy <= 0.0 {
            return Err(SolveError::Diverged(format!(
                "non-positive focal length ({:.3}, {:.3})",
                k.fx, k.fy
            )));
        }
        if !principal_point_inside(&Pt2::new(k.cx, k.cy), image_size) {
            log::warn!(
                "principal point ({:.1}, {:.1}) lies outside the {} image",
                k.cx,
                k.cy,
                image_size
            );
        }

        log::info!(
            "solved {} views: fx={:.2} fy={:.2} cx={:.2} cy={:.2} rms={:.4}",
            samples.len(),
            k.fx,
            k.fy,
            k.cx,
            k.cy,
            rms
        );

        Ok(CalibrationResult {
            intrinsics: est.intrinsics,
            distortion: est.distortion,
            poses: est.poses,
            rms,
            image_size,
        })
    }
}

fn principal_point_inside(p: &Pt2, size: Resolution) -> bool {
    p.x >= 0.0 && p.y >= 0.0 && p.x <= size.width as Real && p.y <= size.height as Real
}
