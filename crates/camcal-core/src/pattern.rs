use crate::{Pt2, Pt3, Real};
use serde::{Deserialize, Serialize};

/// Inner-vertex counts of a checkerboard.
///
/// `cols` runs along the board x axis, `rows` along y. A board printed with
/// 11 x 8 squares has 10 x 7 inner vertices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub cols: usize,
    pub rows: usize,
}

impl GridSize {
    pub const fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    #[inline]
    pub fn corner_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Row-major index of vertex `(i, j)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.cols + i
    }
}

impl std::fmt::Display for GridSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("grid {0} needs at least 2 inner vertices along each axis")]
    GridTooSmall(GridSize),
    #[error("square size must be positive and finite (got {0})")]
    InvalidSpacing(Real),
}

/// Board-frame coordinates of every inner vertex, on the `z = 0` plane.
///
/// Points are stored row-major: the vertex `(i, j)` sits at index
/// `j * cols + i` with coordinates `(i * s, j * s, 0)`. This matches the
/// ordering every [`crate::Observation`] must follow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencePattern {
    grid: GridSize,
    square_size: Real,
    points: Vec<Pt3>,
}

impl ReferencePattern {
    pub fn new(grid: GridSize, square_size: Real) -> Result<Self, PatternError> {
        if grid.cols < 2 || grid.rows < 2 {
            return Err(PatternError::GridTooSmall(grid));
        }
        if !(square_size.is_finite() && square_size > 0.0) {
            return Err(PatternError::InvalidSpacing(square_size));
        }

        let mut points = Vec::with_capacity(grid.corner_count());
        for j in 0..grid.rows {
            for i in 0..grid.cols {
                points.push(Pt3::new(
                    i as Real * square_size,
                    j as Real * square_size,
                    0.0,
                ));
            }
        }

        Ok(Self {
            grid,
            square_size,
            points,
        })
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn square_size(&self) -> Real {
        self.square_size
    }

    pub fn points(&self) -> &[Pt3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The same points dropped onto the board plane, for homography fitting.
    pub fn planar_points(&self) -> Vec<Pt2> {
        self.points.iter().map(|p| Pt2::new(p.x, p.y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn generates_row_major_grid_scaled_by_spacing() {
        let grid = GridSize::new(4, 3);
        let pattern = ReferencePattern::new(grid, 0.025).expect("valid pattern");

        assert_eq!(pattern.len(), 12);
        for j in 0..grid.rows {
            for i in 0..grid.cols {
                let p = pattern.points()[grid.index(i, j)];
                assert_relative_eq!(p.x, i as Real * 0.025);
                assert_relative_eq!(p.y, j as Real * 0.025);
                assert_eq!(p.z, 0.0);
            }
        }
    }

    #[test]
    fn points_are_pairwise_distinct() {
        for (cols, rows, s) in [(2, 2, 1.0), (10, 7, 0.025), (9, 6, 30.0), (3, 11, 0.5)] {
            let pattern = ReferencePattern::new(GridSize::new(cols, rows), s).expect("pattern");
            assert_eq!(pattern.len(), cols * rows);
            let pts = pattern.points();
            for a in 0..pts.len() {
                for b in (a + 1)..pts.len() {
                    assert!(
                        (pts[a] - pts[b]).norm() > 0.5 * s,
                        "points {a} and {b} coincide for {cols}x{rows}"
                    );
                }
            }
        }
    }

    #[test]
    fn first_row_varies_along_x() {
        let pattern = ReferencePattern::new(GridSize::new(10, 7), 0.025).expect("pattern");
        let pts = pattern.points();
        assert_relative_eq!(pts[1].x, 0.025);
        assert_relative_eq!(pts[1].y, 0.0);
        assert_relative_eq!(pts[10].x, 0.0);
        assert_relative_eq!(pts[10].y, 0.025);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert_eq!(
            ReferencePattern::new(GridSize::new(1, 7), 1.0),
            Err(PatternError::GridTooSmall(GridSize::new(1, 7)))
        );
        assert!(matches!(
            ReferencePattern::new(GridSize::new(4, 4), 0.0),
            Err(PatternError::InvalidSpacing(_))
        ));
        assert!(ReferencePattern::new(GridSize::new(4, 4), Real::NAN).is_err());
    }
}
