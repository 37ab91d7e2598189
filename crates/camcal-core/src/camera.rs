//! Pinhole camera with 5-coefficient Brown-Conrady distortion.
//!
//! Projection of a board point `X` through pose `(R, t)`:
//!
//! 1. `Xc = R X + t`, normalised `(x, y) = (Xc.x / Xc.z, Xc.y / Xc.z)`
//! 2. radial `1 + k1 r² + k2 r⁴ + k3 r⁶`, tangential `p1`, `p2`
//! 3. pixel `u = fx x_d + cx`, `v = fy y_d + cy`

use crate::{Mat3, Pt2, Pt3, Real, Vec3};
use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
}

impl Intrinsics {
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real) -> Self {
        Self { fx, fy, cx, cy }
    }

    pub fn matrix(&self) -> Mat3 {
        Mat3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub fn to_pixel(&self, n: Vector2<Real>) -> Pt2 {
        Pt2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    pub fn is_finite(&self) -> bool {
        self.fx.is_finite() && self.fy.is_finite() && self.cx.is_finite() && self.cy.is_finite()
    }
}

/// Radial `k1, k2, k3` and tangential `p1, p2` coefficients, OpenCV order
/// `(k1, k2, p1, p2, k3)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: Real,
    pub k2: Real,
    pub p1: Real,
    pub p2: Real,
    pub k3: Real,
}

impl Distortion {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(c: [Real; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn to_array(&self) -> [Real; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn distort(&self, n: Vector2<Real>) -> Vector2<Real> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }
}

/// Board-to-camera pose. `rotation` is an axis-angle (Rodrigues) vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewPose {
    pub rotation: Vec3,
    pub translation: Vec3,
}

impl ViewPose {
    pub fn new(rotation: Vec3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn from_isometry(iso: &Isometry3<Real>) -> Self {
        Self {
            rotation: iso.rotation.scaled_axis(),
            translation: iso.translation.vector,
        }
    }

    pub fn to_isometry(&self) -> Isometry3<Real> {
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::new(self.rotation));
        Isometry3::from_parts(Translation3::from(self.translation), rot)
    }

    /// Project a board point to pixels. `None` when the point is not in
    /// front of the camera.
    pub fn project(
        &self,
        intrinsics: &Intrinsics,
        distortion: &Distortion,
        board_point: &Pt3,
    ) -> Option<Pt2> {
        let pc = Rotation3::new(self.rotation) * board_point + self.translation;
        if pc.z <= Real::EPSILON {
            return None;
        }
        let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
        Some(intrinsics.to_pixel(distortion.distort(n)))
    }
}
