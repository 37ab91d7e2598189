//! Calibration solver collaborator.
//!
//! [`CalibrationSolver`] is the seam the pipeline calls once with the full
//! sample set. [`PlanarSolver`] implements it for planar targets:
//!
//! 1. per-view homographies (normalised DLT),
//! 2. closed-form intrinsics from the homographies (Zhang),
//! 3. per-view pose decomposition,
//! 4. joint Levenberg-Marquardt refinement of `fx, fy, cx, cy`, the five
//!    distortion coefficients and every pose, minimising reprojection error.
//!
//! The [`synthetic`] module projects a pattern through a known camera for
//! tests and demos.

mod error;
mod planar;
mod pose;
mod refine;
pub mod synthetic;
mod zhang;

use camcal_core::{CalibrationResult, Resolution, SampleSet};

pub use error::SolveError;
pub use planar::{PlanarSolver, SolverOptions, MIN_VIEWS};
pub use pose::pose_from_homography;
pub use zhang::intrinsics_from_homographies;

/// Solves camera intrinsics from a complete set of accepted samples.
pub trait CalibrationSolver {
    /// Deterministic for identical inputs.
    fn solve(
        &self,
        samples: &SampleSet,
        image_size: Resolution,
    ) -> Result<CalibrationResult, SolveError>;
}

impl<T: CalibrationSolver + ?Sized> CalibrationSolver for &T {
    fn solve(
        &self,
        samples: &SampleSet,
        image_size: Resolution,
    ) -> Result<CalibrationResult, SolveError> {
        (**self).solve(samples, image_size)
    }
}

impl<T: CalibrationSolver + ?Sized> CalibrationSolver for Box<T> {
    fn solve(
        &self,
        samples: &SampleSet,
        image_size: Resolution,
    ) -> Result<CalibrationResult, SolveError> {
        (**self).solve(samples, image_size)
    }
}
