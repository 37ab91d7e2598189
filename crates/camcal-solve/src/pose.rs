use camcal_core::{Mat3, Real, ViewPose};
use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion};

use crate::SolveError;

/// Decompose a board-to-image homography into the board pose, given `K`.
///
/// The board lies on `Z = 0`. The scale sign is chosen so the board sits in
/// front of the camera, and the rotation is projected onto SO(3).
pub fn pose_from_homography(kmtx: &Mat3, hmtx: &Mat3) -> Result<ViewPose, SolveError> {
    let k_inv = kmtx
        .try_inverse()
        .ok_or(SolveError::Degenerate("camera matrix is not invertible"))?;

    let a1 = k_inv * hmtx.column(0);
    let a2 = k_inv * hmtx.column(1);
    let a3 = k_inv * hmtx.column(2);

    let norm = 0.5 * (a1.norm() + a2.norm());
    if norm <= Real::EPSILON {
        return Err(SolveError::Degenerate("homography has vanishing columns"));
    }
    let mut lambda = 1.0 / norm;
    if a3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = a1 * lambda;
    let r2 = a2 * lambda;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = r.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(SolveError::Degenerate("rotation svd did not converge"));
    };
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u = u;
        u.column_mut(2).neg_mut();
        r_orth = u * v_t;
    }

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    let iso = Isometry3::from_parts(Translation3::from(a3 * lambda), rot);
    Ok(ViewPose::from_isometry(&iso))
}
