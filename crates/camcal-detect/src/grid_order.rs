use camcal_core::{GridSize, Pt2};

/// Arrange grid-labelled corners into the row-major order of a
/// [`camcal_core::ReferencePattern`].
///
/// `labelled` holds `(i, j, position)` with arbitrary integer offsets. The
/// labelled block must span exactly `cols x rows` (or `rows x cols`, which is
/// transposed) with every vertex present; anything else is a miss.
pub fn order_row_major(labelled: &[(i32, i32, Pt2)], grid: GridSize) -> Option<Vec<Pt2>> {
    let (min_i, max_i) = bounds(labelled.iter().map(|c| c.0))?;
    let (min_j, max_j) = bounds(labelled.iter().map(|c| c.1))?;
    let span_i = (max_i - min_i + 1) as usize;
    let span_j = (max_j - min_j + 1) as usize;

    let transpose = if (span_i, span_j) == (grid.cols, grid.rows) {
        false
    } else if (span_i, span_j) == (grid.rows, grid.cols) {
        true
    } else {
        return None;
    };

    let mut out: Vec<Option<Pt2>> = vec![None; grid.corner_count()];
    for &(i, j, p) in labelled {
        let (a, b) = ((i - min_i) as usize, (j - min_j) as usize);
        let (col, row) = if transpose { (b, a) } else { (a, b) };
        let slot = &mut out[grid.index(col, row)];
        if slot.is_some() {
            // duplicate label
            return None;
        }
        *slot = Some(p);
    }
    out.into_iter().collect()
}

fn bounds(values: impl Iterator<Item = i32>) -> Option<(i32, i32)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
