//! Polygon recovery from a binary mask.
//!
//! Each 8-connected foreground component is traced along its outer boundary
//! (Moore neighbour tracing), clockwise in image axes, starting from the
//! component's first pixel in raster order. Straight runs are collapsed so
//! only the vertices where the direction changes remain.

use super::Mask;
use crate::error::CvatError;

type Point = (i64, i64);

/// Neighbour offsets in clockwise order (y grows downwards), starting east.
const DIRS: [Point; 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const WEST: usize = 4;

/// Outer contour of the largest foreground component, as `[x1, y1, x2, y2, ...]`.
///
/// "Largest" means the contour with the most vertices after compression;
/// ties go to the component found first in raster order. Fails with
/// [`CvatError::ContourTooSmall`] when that contour has fewer than three
/// vertices (empty masks, single pixels, straight lines).
pub fn mask_to_contour_points(mask: &Mask) -> Result<Vec<f64>, CvatError> {
    let mut best: Vec<Point> = Vec::new();
    for contour in external_contours(mask) {
        if contour.len() > best.len() {
            best = contour;
        }
    }

    if best.len() < 3 {
        return Err(CvatError::ContourTooSmall { points: best.len() });
    }

    Ok(best
        .into_iter()
        .flat_map(|(x, y)| [x as f64, y as f64])
        .collect())
}

/// Compressed outer contours of all components, in raster order of their
/// starting pixels.
pub fn external_contours(mask: &Mask) -> Vec<Vec<Point>> {
    let width = i64::from(mask.width());
    let height = i64::from(mask.height());
    let mut visited = vec![false; mask.len()];
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let i = (y * width + x) as usize;
            if visited[i] || !mask.get(x, y) {
                continue;
            }
            mark_component(mask, (x, y), &mut visited);
            contours.push(compress(&trace((x, y), mask)));
        }
    }

    contours
}

/// Flood-fill the 8-connected component containing `seed`.
fn mark_component(mask: &Mask, seed: Point, visited: &mut [bool]) {
    let width = i64::from(mask.width());
    let mut stack = vec![seed];
    visited[(seed.1 * width + seed.0) as usize] = true;

    while let Some((x, y)) = stack.pop() {
        for (dx, dy) in DIRS {
            let (nx, ny) = (x + dx, y + dy);
            if !mask.get(nx, ny) {
                continue;
            }
            let i = (ny * width + nx) as usize;
            if !visited[i] {
                visited[i] = true;
                stack.push((nx, ny));
            }
        }
    }
}

/// Trace the boundary of the component whose first raster pixel is `start`.
///
/// Stops when the walk leaves `start` towards the same neighbour it took on
/// the first step, so every boundary pixel appears once per visit.
fn trace(start: Point, mask: &Mask) -> Vec<Point> {
    let mut points = vec![start];
    let mut current = start;
    // The pixel west of the first raster pixel is always background.
    let mut backtrack = WEST;
    let mut first_step: Option<Point> = None;
    let limit = 4 * mask.len() + 8;

    while points.len() <= limit {
        let Some((next, next_backtrack)) = step(mask, current, backtrack) else {
            break;
        };
        if current == start {
            match first_step {
                None => first_step = Some(next),
                Some(first) if first == next => break,
                Some(_) => {}
            }
        }
        points.push(next);
        current = next;
        backtrack = next_backtrack;
    }

    if points.len() > 1 && points.last() == Some(&start) {
        points.pop();
    }
    points
}

/// Find the next boundary pixel clockwise from the backtrack direction.
///
/// Returns the pixel and the direction, seen from it, of the last background
/// pixel examined.
fn step(mask: &Mask, current: Point, backtrack: usize) -> Option<(Point, usize)> {
    for i in 1..=8 {
        let d = (backtrack + i) % 8;
        let next = offset(current, d);
        if mask.get(next.0, next.1) {
            let previous = offset(current, (d + 7) % 8);
            let back = direction(previous.0 - next.0, previous.1 - next.1)?;
            return Some((next, back));
        }
    }
    None
}

fn offset((x, y): Point, d: usize) -> Point {
    let (dx, dy) = DIRS[d];
    (x + dx, y + dy)
}

fn direction(dx: i64, dy: i64) -> Option<usize> {
    DIRS.iter().position(|&d| d == (dx, dy))
}

/// Drop every point whose incoming and outgoing steps share a direction.
fn compress(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let here = points[i];
            let next = points[(i + 1) % n];
            (here.0 - prev.0, here.1 - prev.1) != (next.0 - here.0, next.1 - here.1)
        })
        .map(|i| points[i])
        .collect()
}
