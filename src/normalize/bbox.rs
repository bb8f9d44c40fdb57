//! Axis-aligned bounding boxes derived from polygons.

use serde::{Deserialize, Serialize};

/// A bounding box in XYWH format (xmin, ymin, width, height).
///
/// Serialized as the four-element array `[xmin, ymin, width, height]`, the
/// layout COCO tooling expects.
#[derive(Clone, Copy, Default, PartialEq)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    #[inline]
    pub fn from_xywh(xmin: f64, ymin: f64, width: f64, height: f64) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    /// Creates a box from its corners.
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::from_xywh(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.xmin + self.width
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.ymin + self.height
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Returns true if all coordinates are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    #[inline]
    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.width, self.height]
    }
}

impl std::fmt::Debug for BBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBox")
            .field("xmin", &self.xmin)
            .field("ymin", &self.ymin)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Serialize for BBox {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BBox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [xmin, ymin, width, height] = <[f64; 4]>::deserialize(deserializer)?;
        Ok(BBox::from_xywh(xmin, ymin, width, height))
    }
}

/// Bounding box of a flat `[x1, y1, x2, y2, ...]` point list.
///
/// Even indices are x coordinates, odd indices y coordinates; a trailing
/// unpaired value is ignored. Returns `None` for an empty list.
pub fn polygon_to_bbox(points: &[f64]) -> Option<BBox> {
    let mut pairs = points.chunks_exact(2);
    let first = pairs.next()?;
    let (mut xmin, mut ymin, mut xmax, mut ymax) = (first[0], first[1], first[0], first[1]);
    for pair in pairs {
        xmin = xmin.min(pair[0]);
        xmax = xmax.max(pair[0]);
        ymin = ymin.min(pair[1]);
        ymax = ymax.max(pair[1]);
    }
    Some(BBox::from_xyxy(xmin, ymin, xmax, ymax))
}
