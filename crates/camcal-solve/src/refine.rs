//! Joint reprojection refinement.
//!
//! Parameter vector: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` followed by
//! `[rx, ry, rz, tx, ty, tz]` per view. Residuals are `(u - u_obs, v - v_obs)`
//! per corner, views in order.

use camcal_core::{Distortion, Intrinsics, Pt2, Pt3, Real, Vec3, ViewPose};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

pub(crate) const CAMERA_PARAMS: usize = 9;
pub(crate) const POSE_PARAMS: usize = 6;

/// Board points and matching detections for one view.
pub(crate) struct ViewData<'a> {
    pub object: &'a [Pt3],
    pub image: &'a [Pt2],
}

pub(crate) struct Estimate {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
    pub poses: Vec<ViewPose>,
}

pub(crate) struct LmOptions {
    pub max_iters: usize,
    pub ftol: Real,
    pub gtol: Real,
}

pub(crate) struct LmOutcome {
    pub estimate: Estimate,
    pub converged: bool,
    pub evaluations: usize,
    pub objective: Real,
}

struct ReprojectionProblem<'a> {
    views: &'a [ViewData<'a>],
    /// First residual row of every view.
    offsets: Vec<usize>,
    residual_len: usize,
    params: DVector<Real>,
}

impl<'a> ReprojectionProblem<'a> {
    fn new(views: &'a [ViewData<'a>], params: DVector<Real>) -> Self {
        let mut offsets = Vec::with_capacity(views.len());
        let mut acc = 0;
        for v in views {
            offsets.push(acc);
            acc += 2 * v.object.len();
        }
        Self {
            views,
            offsets,
            residual_len: acc,
            params,
        }
    }

    fn view_residuals(
        &self,
        x: &DVector<Real>,
        view: usize,
        out: &mut [Real],
    ) -> Option<()> {
        let (k, d) = camera_from(x);
        let pose = pose_from(x, view);
        let data = &self.views[view];
        for (n, (obj, img)) in data.object.iter().zip(data.image).enumerate() {
            let px = pose.project(&k, &d, obj)?;
            out[2 * n] = px.x - img.x;
            out[2 * n + 1] = px.y - img.y;
        }
        Some(())
    }

    fn residuals_at(&self, x: &DVector<Real>) -> Option<DVector<Real>> {
        let mut r = DVector::zeros(self.residual_len);
        for view in 0..self.views.len() {
            let start = self.offsets[view];
            let len = 2 * self.views[view].object.len();
            self.view_residuals(x, view, &mut r.as_mut_slice()[start..start + len])?;
        }
        Some(r)
    }
}

impl LeastSquaresProblem<Real, Dyn, Dyn> for ReprojectionProblem<'_> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        self.residuals_at(&self.params)
    }

    /// Central differences. Pose columns are non-zero only on their own
    /// view's rows.
    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let n_params = self.params.len();
        let mut jac = DMatrix::zeros(self.residual_len, n_params);
        let mut x = self.params.clone();

        for col in 0..CAMERA_PARAMS {
            let step = step_for(x[col]);
            let orig = x[col];
            x[col] = orig + step;
            let plus = self.residuals_at(&x)?;
            x[col] = orig - step;
            let minus = self.residuals_at(&x)?;
            x[col] = orig;
            jac.set_column(col, &((plus - minus) / (2.0 * step)));
        }

        for view in 0..self.views.len() {
            let start = self.offsets[view];
            let len = 2 * self.views[view].object.len();
            let mut plus = vec![0.0; len];
            let mut minus = vec![0.0; len];
            for p in 0..POSE_PARAMS {
                let col = CAMERA_PARAMS + POSE_PARAMS * view + p;
                let step = step_for(x[col]);
                let orig = x[col];
                x[col] = orig + step;
                self.view_residuals(&x, view, &mut plus)?;
                x[col] = orig - step;
                self.view_residuals(&x, view, &mut minus)?;
                x[col] = orig;
                for row in 0..len {
                    jac[(start + row, col)] = (plus[row] - minus[row]) / (2.0 * step);
                }
            }
        }
        Some(jac)
    }
}

fn step_for(value: Real) -> Real {
    1e-6 * value.abs().max(1.0)
}

fn camera_from(x: &DVector<Real>) -> (Intrinsics, Distortion) {
    (
        Intrinsics::new(x[0], x[1], x[2], x[3]),
        Distortion::from_array([x[4], x[5], x[6], x[7], x[8]]),
    )
}

fn pose_from(x: &DVector<Real>, view: usize) -> ViewPose {
    let o = CAMERA_PARAMS + POSE_PARAMS * view;
    ViewPose::new(
        Vec3::new(x[o], x[o + 1], x[o + 2]),
        Vec3::new(x[o + 3], x[o + 4], x[o + 5]),
    )
}

fn pack(est: &Estimate) -> DVector<Real> {
    let k = &est.intrinsics;
    let mut x = DVector::zeros(CAMERA_PARAMS + POSE_PARAMS * est.poses.len());
    x[0] = k.fx;
    x[1] = k.fy;
    x[2] = k.cx;
    x[3] = k.cy;
    for (i, c) in est.distortion.to_array().into_iter().enumerate() {
        x[4 + i] = c;
    }
    for (v, pose) in est.poses.iter().enumerate() {
        let o = CAMERA_PARAMS + POSE_PARAMS * v;
        x.fixed_rows_mut::<3>(o).copy_from(&pose.rotation);
        x.fixed_rows_mut::<3>(o + 3).copy_from(&pose.translation);
    }
    x
}

fn unpack(x: &DVector<Real>, n_views: usize) -> Estimate {
    let (intrinsics, distortion) = camera_from(x);
    Estimate {
        intrinsics,
        distortion,
        poses: (0..n_views).map(|v| pose_from(x, v)).collect(),
    }
}

pub(crate) fn refine(views: &[ViewData<'_>], initial: &Estimate, opts: &LmOptions) -> LmOutcome {
    let problem = ReprojectionProblem::new(views, pack(initial));
    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.ftol)
        .with_gtol(opts.gtol)
        .with_patience(opts.max_iters.max(1));

    let (problem, report) = lm.minimize(problem);
    LmOutcome {
        estimate: unpack(&problem.params, views.len()),
        converged: report.termination.was_successful(),
        evaluations: report.number_of_evaluations,
        objective: report.objective_function,
    }
}

/// `sqrt(sum |e|² / N)` over every corner of every view. `None` when a
/// point projects behind the camera.
pub(crate) fn rms_error(views: &[ViewData<'_>], est: &Estimate) -> Option<Real> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (data, pose) in views.iter().zip(&est.poses) {
        for (obj, img) in data.object.iter().zip(data.image) {
            let px = pose.project(&est.intrinsics, &est.distortion, obj)?;
            sum += (px - img).norm_squared();
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some((sum / count as Real).sqrt())
}
