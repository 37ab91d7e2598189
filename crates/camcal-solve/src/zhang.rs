use camcal_core::{Intrinsics, Mat3, Real};
use nalgebra::{DMatrix, SVector};

use crate::SolveError;

/// Row vector `v_ij(H)` of Zhang's constraint `h_iᵀ B h_j`.
fn v_ij(h: &Mat3, i: usize, j: usize) -> SVector<Real, 6> {
    let hi = h.column(i);
    let hj = h.column(j);

    SVector::<Real, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Closed-form pinhole intrinsics from plane-to-image homographies.
///
/// Needs at least three views in general position. Skew is estimated by the
/// linear system but dropped from the result; the refinement assumes square
/// pixels axes.
pub fn intrinsics_from_homographies(homographies: &[Mat3]) -> Result<Intrinsics, SolveError> {
    if homographies.len() < 3 {
        return Err(SolveError::NotEnoughViews {
            need: 3,
            got: homographies.len(),
        });
    }

    let m = homographies.len();
    let mut v = DMatrix::<Real>::zeros(2 * m, 6);
    for (k, h) in homographies.iter().enumerate() {
        let h = h / h.norm();
        let v11 = v_ij(&h, 0, 0);
        let v22 = v_ij(&h, 1, 1);
        let v12 = v_ij(&h, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    // V b = 0: b is the right singular vector of the smallest singular value,
    // which must be unique.
    let svd = v.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or(SolveError::Degenerate("svd did not converge"))?;
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[a].total_cmp(&svd.singular_values[b]));
    if order.len() < 6 {
        return Err(SolveError::Degenerate("rank-deficient homography system"));
    }
    let s_max = svd.singular_values[order[5]];
    let s_second = svd.singular_values[order[1]];
    if s_second <= 1e-9 * s_max {
        return Err(SolveError::Degenerate(
            "views do not constrain the intrinsics (too little tilt variety)",
        ));
    }
    let b = v_t.row(order[0]);

    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    // v0 = (B12 B13 - B11 B23) / (B11 B22 - B12^2)
    // λ  = B33 - (B13^2 + v0 (B12 B13 - B11 B23)) / B11
    // α  = sqrt(λ / B11)
    // β  = sqrt(λ B11 / (B11 B22 - B12^2))
    // γ  = -B12 α^2 β / λ
    // u0 = γ v0 / β - B13 α^2 / λ
    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-9 {
        return Err(SolveError::Degenerate("singular conic of the absolute"));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    let alpha2 = lambda / b11;
    let beta2 = lambda * b11 / denom;
    if !(alpha2 > 0.0 && beta2 > 0.0) {
        return Err(SolveError::Degenerate("imaginary focal length"));
    }
    let alpha = alpha2.sqrt();
    let beta = beta2.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    log::debug!(
        "zhang init: fx={alpha:.3} fy={beta:.3} cx={u0:.3} cy={v0:.3} (skew {gamma:.3e} dropped)"
    );

    let k = Intrinsics::new(alpha, beta, u0, v0);
    if !k.is_finite() {
        return Err(SolveError::Degenerate("non-finite intrinsics"));
    }
    Ok(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    fn homography(k: &Mat3, rot: Rotation3<Real>, t: Vector3<Real>) -> Mat3 {
        // Z = 0 plane: H = K [r1 r2 t]
        let r = rot.matrix();
        let mut h = Mat3::zeros();
        h.set_column(0, &(k * r.column(0)));
        h.set_column(1, &(k * r.column(1)));
        h.set_column(2, &(k * t));
        h
    }

    fn kmtx() -> Mat3 {
        Intrinsics::new(900.0, 880.0, 640.0, 360.0).matrix()
    }

    #[test]
    fn recovers_intrinsics_from_three_views() {
        let k = kmtx();
        let hs = vec![
            homography(
                &k,
                Rotation3::from_euler_angles(0.1, 0.0, 0.05),
                Vector3::new(0.1, -0.05, 1.0),
            ),
            homography(
                &k,
                Rotation3::from_euler_angles(-0.05, 0.15, -0.1),
                Vector3::new(-0.05, 0.1, 1.2),
            ),
            homography(
                &k,
                Rotation3::from_euler_angles(0.2, -0.1, 0.0),
                Vector3::new(0.0, 0.0, 0.9),
            ),
        ];

        let est = intrinsics_from_homographies(&hs).expect("intrinsics");
        assert!((est.fx - 900.0).abs() < 1e-3, "fx {}", est.fx);
        assert!((est.fy - 880.0).abs() < 1e-3, "fy {}", est.fy);
        assert!((est.cx - 640.0).abs() < 1e-3, "cx {}", est.cx);
        assert!((est.cy - 360.0).abs() < 1e-3, "cy {}", est.cy);
    }

    #[test]
    fn homography_scale_and_sign_do_not_matter() {
        let k = kmtx();
        let rots = [(0.1, 0.0, 0.05), (-0.05, 0.15, -0.1), (0.2, -0.1, 0.0)];
        let hs: Vec<Mat3> = rots
            .iter()
            .enumerate()
            .map(|(i, &(r, p, y))| {
                let h = homography(
                    &k,
                    Rotation3::from_euler_angles(r, p, y),
                    Vector3::new(0.0, 0.0, 1.0),
                );
                h * if i % 2 == 0 { -3.5 } else { 0.01 }
            })
            .collect();
        let est = intrinsics_from_homographies(&hs).expect("intrinsics");
        assert!((est.fx - 900.0).abs() < 1e-3);
    }

    #[test]
    fn fronto_parallel_views_are_degenerate() {
        let k = kmtx();
        let hs: Vec<Mat3> = (0..4)
            .map(|i| {
                homography(
                    &k,
                    Rotation3::identity(),
                    Vector3::new(0.05 * i as Real, 0.0, 1.0 + 0.1 * i as Real),
                )
            })
            .collect();
        assert!(matches!(
            intrinsics_from_homographies(&hs),
            Err(SolveError::Degenerate(_))
        ));
    }

    #[test]
    fn needs_three_views() {
        let k = kmtx();
        let h = homography(&k, Rotation3::identity(), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(
            intrinsics_from_homographies(&[h, h]),
            Err(SolveError::NotEnoughViews { need: 3, got: 2 })
        );
    }
}
