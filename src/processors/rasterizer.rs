//! Area expansion: turn a four-corner region into every integer coordinate
//! it encloses.

use crate::error::{HarvestError, Result};
use crate::models::Coordinate;
use ndarray::Array2;

const CORNER_COUNT: usize = 4;
const EPSILON: f64 = 1e-9;

/// Return every integer coordinate inside or on the boundary of the polygon
/// spanned by exactly four corners.
///
/// Corners are rounded to whole degrees first. Points come back in the
/// input coordinate space in row-major (latitude, then longitude) order;
/// callers should not rely on that order.
pub fn rasterize_polygon(corners: &[Coordinate]) -> Result<Vec<Coordinate>> {
    if corners.len() != CORNER_COUNT {
        return Err(HarvestError::InvalidInput(format!(
            "Area expansion requires exactly {} coordinates, got {}",
            CORNER_COUNT,
            corners.len()
        )));
    }

    if let Some(bad) = corners.iter().find(|c| !c.is_finite()) {
        return Err(HarvestError::InvalidInput(format!(
            "Area corner {} is not a finite coordinate",
            bad
        )));
    }

    let rounded: Vec<(i64, i64)> = corners.iter().map(Coordinate::rounded).collect();

    let min_x = rounded.iter().map(|p| p.0).min().unwrap_or(0);
    let max_x = rounded.iter().map(|p| p.0).max().unwrap_or(0);
    let min_y = rounded.iter().map(|p| p.1).min().unwrap_or(0);
    let max_y = rounded.iter().map(|p| p.1).max().unwrap_or(0);

    let vertices: Vec<(i64, i64)> = rounded
        .iter()
        .map(|&(x, y)| (x - min_x, y - min_y))
        .collect();

    let rows = (max_x - min_x + 1) as usize;
    let cols = (max_y - min_y + 1) as usize;
    let mut grid = Array2::from_elem((rows, cols), false);

    fill_scanlines(&vertices, &mut grid);
    trace_edges(&vertices, &mut grid);

    Ok(grid
        .indexed_iter()
        .filter(|(_, inside)| **inside)
        .map(|((x, y), _)| Coordinate::new((x as i64 + min_x) as f64, (y as i64 + min_y) as f64))
        .collect())
}

/// Even-odd scan-line fill over grid rows. An edge counts for rows in
/// `[start, end)` of its row span so shared vertices are crossed once.
fn fill_scanlines(vertices: &[(i64, i64)], grid: &mut Array2<bool>) {
    let (rows, cols) = grid.dim();
    let n = vertices.len();

    for row in 0..rows {
        let x = row as i64;
        let mut crossings: Vec<f64> = Vec::with_capacity(n);

        for i in 0..n {
            let (x0, y0) = vertices[i];
            let (x1, y1) = vertices[(i + 1) % n];

            if (x0 <= x && x < x1) || (x1 <= x && x < x0) {
                let t = (x - x0) as f64 / (x1 - x0) as f64;
                crossings.push(y0 as f64 + t * (y1 - y0) as f64);
            }
        }

        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let start = ((span[0] - EPSILON).ceil() as i64).max(0);
            let end = ((span[1] + EPSILON).floor() as i64).min(cols as i64 - 1);
            for y in start..=end {
                grid[[row, y as usize]] = true;
            }
        }
    }
}

/// Mark the grid cells that lie exactly on the polygon outline, so boundary
/// cells the half-open fill rule leaves out are still included. Along an
/// edge with integer endpoints those are the `gcd(dx, dy) + 1` evenly spaced
/// lattice points.
fn trace_edges(vertices: &[(i64, i64)], grid: &mut Array2<bool>) {
    let n = vertices.len();

    for i in 0..n {
        let (x0, y0) = vertices[i];
        let (x1, y1) = vertices[(i + 1) % n];
        let (dx, dy) = (x1 - x0, y1 - y0);

        let steps = gcd(dx.abs(), dy.abs());
        if steps == 0 {
            grid[[x0 as usize, y0 as usize]] = true;
            continue;
        }

        let (step_x, step_y) = (dx / steps, dy / steps);
        for k in 0..=steps {
            let (x, y) = (x0 + k * step_x, y0 + k * step_y);
            grid[[x as usize, y as usize]] = true;
        }
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
