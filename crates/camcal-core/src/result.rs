use crate::{Distortion, Intrinsics, Real, ViewPose};
use serde::{Deserialize, Serialize};

/// Frame size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Solved camera model for one calibration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
    /// One pose per accepted sample, in sample order.
    pub poses: Vec<ViewPose>,
    /// Root-mean-square reprojection error over all corners, in pixels.
    pub rms: Real,
    pub image_size: Resolution,
}
