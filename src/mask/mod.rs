//! Binary masks and the server's run-length mask codec.
//!
//! Mask shapes arrive as a flat number list: alternating run lengths followed
//! by the `left, top, right, bottom` corners of the box the runs fill. Runs
//! are laid out row-major over the box width, starting with a run of zeros.
//! Everything outside the box is background.
//!
//! Pixel coordinates follow image conventions: `x` is the column, `y` the
//! row, the origin is the top-left corner and flattened point lists are
//! ordered `[x1, y1, x2, y2, ...]`.

pub mod contour;
pub mod raster;

use std::fmt;

use image::{GrayImage, Luma};

use crate::error::CvatError;

pub use contour::mask_to_contour_points;
pub use raster::{rasterize_polygon, split_foreground_background, split_image_file};

const FOREGROUND: Luma<u8> = Luma([255]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// A dense `height × width` binary mask backed by an 8-bit grayscale image.
///
/// Foreground cells hold 255 and background cells 0, so the backing image
/// can be saved or composed like any other.
#[derive(Clone, PartialEq, Eq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    /// An all-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Build a mask from rows of 0/1 values. Any non-zero value is foreground.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, CvatError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.as_ref().len());
        let mut mask = Self::new(dim(width)?, dim(height)?);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(CvatError::DimensionMismatch {
                    message: format!("row {y} has {} cells, expected {width}", row.len()),
                });
            }
            for (x, &v) in row.iter().enumerate() {
                mask.set(x as i64, y as i64, v != 0);
            }
        }
        Ok(mask)
    }

    /// Threshold a grayscale image: any non-zero pixel is foreground.
    pub fn from_image(image: &GrayImage) -> Self {
        let mut mask = Self::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel.0[0] != 0 {
                mask.image.put_pixel(x, y, FOREGROUND);
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of cells, foreground or not.
    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns false for coordinates outside the mask.
    pub fn get(&self, x: i64, y: i64) -> bool {
        self.cell(x, y)
            .is_some_and(|(x, y)| self.image.get_pixel(x, y).0[0] != 0)
    }

    /// Set one cell; out-of-range coordinates are ignored.
    pub fn set(&mut self, x: i64, y: i64, value: bool) {
        if let Some((x, y)) = self.cell(x, y) {
            let pixel = if value { FOREGROUND } else { BACKGROUND };
            self.image.put_pixel(x, y, pixel);
        }
    }

    /// Number of foreground cells.
    pub fn count_ones(&self) -> usize {
        self.image.as_raw().iter().filter(|&&v| v != 0).count()
    }

    /// The backing 0/255 grayscale image.
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Rows of 0/1 values, convenient for comparisons and printing.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.image
            .rows()
            .map(|row| row.map(|pixel| u8::from(pixel.0[0] != 0)).collect())
            .collect()
    }

    fn cell(&self, x: i64, y: i64) -> Option<(u32, u32)> {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return None;
        }
        Some((x as u32, y as u32))
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mask {}x{}", self.width(), self.height())?;
        for row in self.to_rows() {
            let line: String = row.iter().map(|&v| if v == 1 { '#' } else { '.' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn dim(n: usize) -> Result<u32, CvatError> {
    u32::try_from(n).map_err(|_| CvatError::DimensionMismatch {
        message: format!("{n} exceeds the maximum mask dimension"),
    })
}

/// The box a run-length mask is laid out in. Corners are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RleBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl RleBox {
    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    /// Number of cells covered by the box.
    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Tight box around the foreground of `mask`, or `None` if it is empty.
    pub fn around(mask: &Mask) -> Option<Self> {
        let mut found: Option<Self> = None;
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if !mask.get(i64::from(x), i64::from(y)) {
                    continue;
                }
                found = Some(match found {
                    None => Self {
                        left: x,
                        top: y,
                        right: x,
                        bottom: y,
                    },
                    Some(b) => Self {
                        left: b.left.min(x),
                        top: b.top.min(y),
                        right: b.right.max(x),
                        bottom: b.bottom.max(y),
                    },
                });
            }
        }
        found
    }

    fn check_inside(&self, width: u32, height: u32) -> Result<(), CvatError> {
        if self.left > self.right || self.top > self.bottom {
            return Err(CvatError::InvalidRle {
                message: format!("box {self:?} has inverted corners"),
            });
        }
        if self.right >= width || self.bottom >= height {
            return Err(CvatError::InvalidRle {
                message: format!("box {self:?} does not fit a {width}x{height} image"),
            });
        }
        Ok(())
    }
}

/// Decode a run-length mask into a full-image mask.
///
/// `points` holds the run lengths followed by `left, top, right, bottom`.
/// Fractional values are truncated. A zero-length run only flips the value.
/// Runs that extend past the box area are rejected; runs that stop short
/// leave the remaining box cells as background.
pub fn decode_rle(points: &[f64], height: u32, width: u32) -> Result<Mask, CvatError> {
    if points.len() < 4 {
        return Err(CvatError::InvalidRle {
            message: format!(
                "expected run lengths followed by four box coordinates, got {} value(s)",
                points.len()
            ),
        });
    }
    let (runs, corners) = points.split_at(points.len() - 4);
    let rle_box = RleBox {
        left: to_count(corners[0], "left")? as u32,
        top: to_count(corners[1], "top")? as u32,
        right: to_count(corners[2], "right")? as u32,
        bottom: to_count(corners[3], "bottom")? as u32,
    };
    rle_box.check_inside(width, height)?;

    let box_width = rle_box.width() as usize;
    let area = rle_box.area();
    let mut mask = Mask::new(width, height);
    let mut value = false;
    let mut offset = 0usize;

    for &run in runs {
        let run = to_count(run, "run length")?;
        let end = offset.checked_add(run).filter(|&end| end <= area).ok_or_else(|| {
            CvatError::InvalidRle {
                message: format!("runs exceed the {area} cell(s) of box {rle_box:?}"),
            }
        })?;
        if value {
            for cell in offset..end {
                let x = (cell % box_width) as i64 + i64::from(rle_box.left);
                let y = (cell / box_width) as i64 + i64::from(rle_box.top);
                mask.set(x, y, true);
            }
        }
        offset = end;
        value = !value;
    }

    Ok(mask)
}

/// Encode the part of `mask` inside `rle_box` in the run-length format read
/// by [`decode_rle`]. The first run counts background cells and may be zero.
pub fn encode_rle(mask: &Mask, rle_box: RleBox) -> Result<Vec<f64>, CvatError> {
    rle_box.check_inside(mask.width(), mask.height())?;

    let mut runs = Vec::new();
    let mut value = false;
    let mut run = 0u64;
    for y in rle_box.top..=rle_box.bottom {
        for x in rle_box.left..=rle_box.right {
            if mask.get(i64::from(x), i64::from(y)) != value {
                runs.push(run as f64);
                value = !value;
                run = 0;
            }
            run += 1;
        }
    }
    runs.push(run as f64);
    runs.extend([
        f64::from(rle_box.left),
        f64::from(rle_box.top),
        f64::from(rle_box.right),
        f64::from(rle_box.bottom),
    ]);
    Ok(runs)
}

fn to_count(value: f64, what: &str) -> Result<usize, CvatError> {
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(CvatError::InvalidRle {
            message: format!("{what} {value} is not a non-negative count"),
        });
    }
    Ok(value.trunc() as usize)
}
