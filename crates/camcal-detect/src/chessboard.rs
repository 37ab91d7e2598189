//! ChESS-based chessboard backend.
//!
//! Runs the `chess-corners` saddle detector and the `calib-targets` grid
//! assembler, then keeps the detection only if it covers the full expected
//! grid.

use calib_targets::chessboard::DetectorParams;
use calib_targets::detect;
use camcal_core::{GrayImageView, GridSize, Pt2};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{order_row_major, CornerDetector};

#[derive(Clone, Debug, Default)]
pub struct ChessboardCornerDetector {
    params: DetectorParams,
}

impl ChessboardCornerDetector {
    /// `min_labeled_corners` is raised per call to the requested grid's
    /// corner count.
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }
}

impl CornerDetector for ChessboardCornerDetector {
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    fn detect(&self, image: &GrayImageView<'_>, grid: GridSize) -> Option<Vec<Pt2>> {
        let img = ::image::GrayImage::from_raw(
            u32::try_from(image.width).ok()?,
            u32::try_from(image.height).ok()?,
            image.data.to_vec(),
        )?;

        let mut params = self.params.clone();
        params.min_labeled_corners = params.min_labeled_corners.max(grid.corner_count());

        let detection = detect::detect_chessboard(&img, &params)?;

        let labelled: Vec<(i32, i32, Pt2)> = detection
            .target
            .corners
            .iter()
            .filter_map(|c| {
                let g = c.grid?;
                Some((
                    g.i,
                    g.j,
                    Pt2::new(f64::from(c.position.x), f64::from(c.position.y)),
                ))
            })
            .collect();

        let ordered = order_row_major(&labelled, grid);
        if ordered.is_none() {
            log::trace!(
                "chessboard found with {} labelled corners, not a complete {} grid",
                labelled.len(),
                grid
            );
        }
        ordered
    }
}
