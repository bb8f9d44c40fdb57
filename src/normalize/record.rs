//! The flat export record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::bbox::BBox;
use crate::api::models::ShapeType;

/// Kind of an exported record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Tag,
    Points,
    Polyline,
    Polygon,
    Rectangle,
}

impl RecordKind {
    /// The record kind for a shape type, or `None` if shapes of that type
    /// are not exported.
    pub fn from_shape_type(shape_type: &ShapeType) -> Option<Self> {
        match shape_type {
            ShapeType::Points => Some(RecordKind::Points),
            ShapeType::Polyline => Some(RecordKind::Polyline),
            ShapeType::Polygon => Some(RecordKind::Polygon),
            ShapeType::Rectangle => Some(RecordKind::Rectangle),
            ShapeType::Mask | ShapeType::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Tag => "tag",
            RecordKind::Points => "points",
            RecordKind::Polyline => "polyline",
            RecordKind::Polygon => "polygon",
            RecordKind::Rectangle => "rectangle",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized annotation, detached from the raw server ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub image_id: String,

    /// Set on records produced from a track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,

    #[serde(rename = "type")]
    pub kind: RecordKind,

    pub label: String,

    /// Attribute name → value; `None` (serialized as `null`) when the
    /// annotation carries no attributes.
    pub attributes: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
}

impl ExportRecord {
    /// Value of one attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .as_ref()
            .and_then(|attrs| attrs.get(name))
            .map(String::as_str)
    }
}
