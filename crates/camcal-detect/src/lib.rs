//! Corner detection collaborators for checkerboard calibration.
//!
//! Detection and refinement sit behind two small traits so the sample
//! collector can be driven by any vision backend, including scripted ones in
//! tests:
//!
//! - [`CornerDetector`] finds all inner vertices of the expected grid, or
//!   reports that the board is not (fully) visible.
//! - [`CornerRefiner`] improves corner localisation to sub-pixel precision.
//!
//! [`SubPixRefiner`] is a gradient-orthogonality refiner. With the
//! `chessboard` feature, [`ChessboardCornerDetector`] runs the ChESS corner
//! detector and grid assembly from `calib-targets`.
//!
//! ```
//! use camcal_core::{GrayImage, GridSize, Pt2};
//! use camcal_detect::{detect_and_refine, CornerDetector, SubPixParams, SubPixRefiner};
//!
//! struct NeverFound;
//! impl CornerDetector for NeverFound {
//!     fn detect(&self, _: &camcal_core::GrayImageView<'_>, _: GridSize) -> Option<Vec<Pt2>> {
//!         None
//!     }
//! }
//!
//! let frame = GrayImage::new(64, 48);
//! let obs = detect_and_refine(
//!     &NeverFound,
//!     &SubPixRefiner,
//!     &frame.view(),
//!     GridSize::new(10, 7),
//!     &SubPixParams::default(),
//! );
//! assert!(obs.is_none());
//! ```

mod grid_order;
mod subpix;

#[cfg(feature = "chessboard")]
mod chessboard;

use camcal_core::{GrayImageView, GridSize, Observation, Pt2};

pub use grid_order::order_row_major;
pub use subpix::{SubPixParams, SubPixRefiner, TermCriteria};

#[cfg(feature = "chessboard")]
pub use chessboard::ChessboardCornerDetector;

/// Finds the inner vertices of a checkerboard in a grayscale frame.
pub trait CornerDetector {
    /// Returns every corner of `grid` in row-major order, or `None` when the
    /// board is not found. A miss is a normal per-frame outcome.
    fn detect(&self, image: &GrayImageView<'_>, grid: GridSize) -> Option<Vec<Pt2>>;
}

/// Improves corner positions to sub-pixel precision.
pub trait CornerRefiner {
    /// Returns refined corners in the same order as `corners`.
    fn refine(&self, image: &GrayImageView<'_>, corners: &[Pt2], params: &SubPixParams)
        -> Vec<Pt2>;
}

impl<T: CornerDetector + ?Sized> CornerDetector for &T {
    fn detect(&self, image: &GrayImageView<'_>, grid: GridSize) -> Option<Vec<Pt2>> {
        (**self).detect(image, grid)
    }
}

impl<T: CornerDetector + ?Sized> CornerDetector for Box<T> {
    fn detect(&self, image: &GrayImageView<'_>, grid: GridSize) -> Option<Vec<Pt2>> {
        (**self).detect(image, grid)
    }
}

/// Leaves corners untouched; for backends that already refine.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRefinement;

impl CornerRefiner for NoRefinement {
    fn refine(&self, _: &GrayImageView<'_>, corners: &[Pt2], _: &SubPixParams) -> Vec<Pt2> {
        corners.to_vec()
    }
}

/// Detect, check the corner count, then refine.
///
/// Returns `None` on a miss, including a detector that returns the wrong
/// number of corners.
pub fn detect_and_refine<D, R>(
    detector: &D,
    refiner: &R,
    image: &GrayImageView<'_>,
    grid: GridSize,
    params: &SubPixParams,
) -> Option<Observation>
where
    D: CornerDetector + ?Sized,
    R: CornerRefiner + ?Sized,
{
    let corners = detector.detect(image, grid)?;
    if corners.len() != grid.corner_count() {
        log::warn!(
            "detector returned {} corners for a {} grid; treating as a miss",
            corners.len(),
            grid
        );
        return None;
    }
    let refined = refiner.refine(image, &corners, params);
    Some(Observation::new(refined))
}
