//! Polygon rasterization and mask-based image splitting.

use std::path::Path;

use image::{ImageBuffer, Pixel, RgbImage};

use super::Mask;
use crate::error::CvatError;

/// Rasterize a polygon `[x1, y1, x2, y2, ...]` into a `height × width` mask.
///
/// Interior pixels are chosen with the even-odd rule at pixel centres; the
/// outline through the rounded vertices is always included. Parts outside
/// the image are clipped.
pub fn rasterize_polygon(points: &[f64], height: u32, width: u32) -> Result<Mask, CvatError> {
    if points.len() % 2 != 0 {
        return Err(CvatError::InvalidPolygon {
            message: format!("odd number of coordinates ({})", points.len()),
        });
    }
    if points.len() < 6 {
        return Err(CvatError::InvalidPolygon {
            message: format!("{} vertex(es); at least three are needed", points.len() / 2),
        });
    }
    if let Some(bad) = points.iter().find(|v| !v.is_finite()) {
        return Err(CvatError::InvalidPolygon {
            message: format!("non-finite coordinate {bad}"),
        });
    }

    let vertices: Vec<(f64, f64)> = points.chunks_exact(2).map(|p| (p[0], p[1])).collect();
    let mut mask = Mask::new(width, height);

    fill_even_odd(&vertices, &mut mask);

    for (i, &from) in vertices.iter().enumerate() {
        let to = vertices[(i + 1) % vertices.len()];
        if let Some((from, to)) = clip_segment(round(from), round(to), width, height) {
            draw_line(&mut mask, from, to);
        }
    }

    Ok(mask)
}

fn fill_even_odd(vertices: &[(f64, f64)], mask: &mut Mask) {
    let width = i64::from(mask.width());
    let mut crossings: Vec<f64> = Vec::with_capacity(vertices.len());

    for y in 0..i64::from(mask.height()) {
        let cy = y as f64 + 0.5;
        crossings.clear();
        for (i, &(x0, y0)) in vertices.iter().enumerate() {
            let (x1, y1) = vertices[(i + 1) % vertices.len()];
            if (y0 <= cy) != (y1 <= cy) {
                crossings.push(x0 + (cy - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for pair in crossings.chunks_exact(2) {
            // Pixel x is inside when its centre x + 0.5 lies in [pair[0], pair[1]).
            let start = ((pair[0] - 0.5).ceil() as i64).max(0);
            let end = ((pair[1] - 0.5).ceil() as i64).min(width);
            for x in start..end {
                mask.set(x, y, true);
            }
        }
    }
}

fn round((x, y): (f64, f64)) -> (f64, f64) {
    (x.round(), y.round())
}

/// Liang-Barsky clip of a segment to the pixel grid `[0, width) × [0, height)`.
///
/// Returns the rounded endpoints of the visible part, or `None` when the
/// segment misses the grid. Stepping is then bounded by the image size.
fn clip_segment(
    (x0, y0): (f64, f64),
    (x1, y1): (f64, f64),
    width: u32,
    height: u32,
) -> Option<((i64, i64), (i64, i64))> {
    if width == 0 || height == 0 {
        return None;
    }
    let (max_x, max_y) = (f64::from(width - 1), f64::from(height - 1));
    let (dx, dy) = (x1 - x0, y1 - y0);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [(-dx, x0), (dx, max_x - x0), (-dy, y0), (dy, max_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| {
        let x = (x0 + t * dx).round().clamp(0.0, max_x);
        let y = (y0 + t * dy).round().clamp(0.0, max_y);
        (x as i64, y as i64)
    };
    Some((at(t0), at(t1)))
}

/// Bresenham line, both endpoints included.
fn draw_line(mask: &mut Mask, (mut x0, mut y0): (i64, i64), (x1, y1): (i64, i64)) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        mask.set(x0, y0, true);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Split `image` into its masked foreground and the remaining background.
///
/// The first image keeps pixels under the mask and zeroes the rest; the
/// second is its complement. Works for any pixel type, so grayscale and
/// colour images are split alike.
#[allow(clippy::type_complexity)]
pub fn split_foreground_background<P: Pixel>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    mask: &Mask,
) -> Result<(ImageBuffer<P, Vec<P::Subpixel>>, ImageBuffer<P, Vec<P::Subpixel>>), CvatError> {
    if image.dimensions() != (mask.width(), mask.height()) {
        return Err(CvatError::DimensionMismatch {
            message: format!(
                "image is {}x{} but mask is {}x{}",
                image.width(),
                image.height(),
                mask.width(),
                mask.height()
            ),
        });
    }

    let mut foreground = ImageBuffer::new(image.width(), image.height());
    let mut background = ImageBuffer::new(image.width(), image.height());

    for (x, y, pixel) in image.enumerate_pixels() {
        let target = if mask.get(i64::from(x), i64::from(y)) {
            &mut foreground
        } else {
            &mut background
        };
        target.put_pixel(x, y, *pixel);
    }

    Ok((foreground, background))
}

/// Load an image file as 8-bit RGB and split it with `mask`.
pub fn split_image_file(path: &Path, mask: &Mask) -> Result<(RgbImage, RgbImage), CvatError> {
    let image = image::open(path).map_err(|source| CvatError::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    split_foreground_background(&image.to_rgb8(), mask)
}
