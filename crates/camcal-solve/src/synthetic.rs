//! Synthetic views of a planar pattern through a known camera.
//!
//! Used by the solver tests and by the facade's demo session.

use std::sync::Arc;
use std::time::Duration;

use camcal_core::{
    CalibrationSample, Distortion, Intrinsics, Observation, Pt2, Real, ReferencePattern,
    SampleError, SampleSet, Vec3, ViewPose,
};
use nalgebra::Rotation3;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyntheticError {
    #[error("view {view} puts part of the board behind the camera")]
    NotVisible { view: usize },
    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// `views` poses looking at the board centre from `distance`, tilted around
/// a cone of half-angle `tilt` radians with a small roll per view.
pub fn orbit_poses(
    pattern: &ReferencePattern,
    views: usize,
    distance: Real,
    tilt: Real,
) -> Vec<ViewPose> {
    let grid = pattern.grid();
    let s = pattern.square_size();
    let centre = Vec3::new(
        0.5 * (grid.cols - 1) as Real * s,
        0.5 * (grid.rows - 1) as Real * s,
        0.0,
    );

    (0..views)
        .map(|i| {
            let phase = std::f64::consts::TAU * i as Real / views.max(1) as Real;
            let roll = if i % 2 == 0 { 0.05 } else { -0.08 };
            let rot = Rotation3::from_euler_angles(tilt * phase.cos(), tilt * phase.sin(), roll);
            // board centre lands on the optical axis
            let t = Vec3::new(0.0, 0.0, distance) - rot * centre;
            ViewPose::new(rot.scaled_axis(), t)
        })
        .collect()
}

/// Pixel positions of every pattern corner, row-major. `None` if any corner
/// is behind the camera.
pub fn project_pattern(
    pattern: &ReferencePattern,
    intrinsics: &Intrinsics,
    distortion: &Distortion,
    pose: &ViewPose,
) -> Option<Vec<Pt2>> {
    pattern
        .points()
        .iter()
        .map(|p| pose.project(intrinsics, distortion, p))
        .collect()
}

/// One noiseless sample per pose, stamped one second apart.
pub fn synthetic_samples(
    pattern: Arc<ReferencePattern>,
    intrinsics: &Intrinsics,
    distortion: &Distortion,
    poses: &[ViewPose],
) -> Result<SampleSet, SyntheticError> {
    let samples = poses
        .iter()
        .enumerate()
        .map(|(view, pose)| {
            let corners = project_pattern(&pattern, intrinsics, distortion, pose)
                .ok_or(SyntheticError::NotVisible { view })?;
            Ok(CalibrationSample::new(
                Arc::clone(&pattern),
                Observation::new(corners),
                Duration::from_secs(view as u64),
            )?)
        })
        .collect::<Result<Vec<_>, SyntheticError>>()?;
    Ok(SampleSet::new(samples)?)
}
