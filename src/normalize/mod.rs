//! Flattening of raw annotations into [`ExportRecord`]s.
//!
//! Label and attribute ids are resolved to names, track attributes are merged
//! into every track shape, and geometry is attached according to
//! [`NormalizeOptions`]. An id missing from the label dictionaries is fatal:
//! it means the labels and the annotations come from inconsistent
//! snapshots. An unsupported geometry type is not: the shape is dropped and
//! counted in the [`ErrorSink`].

pub mod bbox;
pub mod record;

use std::collections::{BTreeMap, HashMap};

use crate::api::ids::{AttributeId, LabelId};
use crate::api::models::{Annotations, AttributeValue, Label, Shape, ShapeType, Tag, Track};
use crate::error::CvatError;
use crate::reconcile::FrameTable;
use crate::report::ErrorSink;

pub use bbox::{polygon_to_bbox, BBox};
pub use record::{ExportRecord, RecordKind};

/// Label and attribute names by id.
#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    labels: HashMap<LabelId, String>,
    attributes: HashMap<AttributeId, String>,
}

impl LabelMap {
    /// Index the labels (and all their attribute specs) of a task.
    pub fn from_labels(labels: &[Label]) -> Self {
        let mut map = Self::default();
        for label in labels {
            map.labels.insert(label.id, label.name.clone());
            for spec in &label.attributes {
                map.attributes.insert(spec.id, spec.name.clone());
            }
        }
        map
    }

    pub fn label_name(&self, id: LabelId) -> Result<&str, CvatError> {
        self.labels
            .get(&id)
            .map(String::as_str)
            .ok_or(CvatError::UnknownLabel { label_id: id })
    }

    pub fn attribute_name(&self, id: AttributeId) -> Result<&str, CvatError> {
        self.attributes
            .get(&id)
            .map(String::as_str)
            .ok_or(CvatError::UnknownAttribute { spec_id: id })
    }

    /// Resolve attribute values into a name → value mapping.
    pub fn resolve_attributes(
        &self,
        values: &[AttributeValue],
    ) -> Result<BTreeMap<String, String>, CvatError> {
        values
            .iter()
            .map(|attr| -> Result<(String, String), CvatError> {
                Ok((self.attribute_name(attr.spec_id)?.to_string(), attr.value.clone()))
            })
            .collect()
    }
}

/// Which annotation kinds carry geometry into the export.
///
/// Shapes of a supported kind are always exported; a disabled toggle only
/// leaves out their `points`. `bboxes` adds a derived `bbox` to polygons.
/// Tags are exported only when `tags` is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub points: bool,
    pub polylines: bool,
    pub polygons: bool,
    pub bboxes: bool,
    pub rectangles: bool,
    pub tags: bool,
}

impl NormalizeOptions {
    /// Every toggle enabled.
    pub fn all() -> Self {
        Self {
            points: true,
            polylines: true,
            polygons: true,
            bboxes: true,
            rectangles: true,
            tags: true,
        }
    }

    /// Returns true if no toggle is enabled.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn keeps_points(&self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::Points => self.points,
            RecordKind::Polyline => self.polylines,
            RecordKind::Polygon => self.polygons,
            RecordKind::Rectangle => self.rectangles,
            RecordKind::Tag => false,
        }
    }
}

/// Normalizes the annotations of one task against its frame table.
pub struct Normalizer<'a> {
    frames: &'a FrameTable,
    labels: &'a LabelMap,
    options: NormalizeOptions,
}

impl<'a> Normalizer<'a> {
    pub fn new(frames: &'a FrameTable, labels: &'a LabelMap, options: NormalizeOptions) -> Self {
        Self {
            frames,
            labels,
            options,
        }
    }

    /// Normalize a job's annotations: shapes, then tracks, then tags (when
    /// enabled).
    pub fn normalize_annotations(
        &self,
        annotations: &Annotations,
        sink: &mut ErrorSink,
    ) -> Result<Vec<ExportRecord>, CvatError> {
        let mut records = Vec::with_capacity(annotations.shapes.len() + annotations.tags.len());
        for shape in &annotations.shapes {
            records.extend(self.normalize_shape(shape, sink)?);
        }
        for track in &annotations.tracks {
            records.extend(self.normalize_track(track, sink)?);
        }
        if self.options.tags {
            for tag in &annotations.tags {
                records.push(self.normalize_tag(tag)?);
            }
        }
        Ok(records)
    }

    pub fn normalize_tag(&self, tag: &Tag) -> Result<ExportRecord, CvatError> {
        Ok(ExportRecord {
            image_id: self.image_id(tag.frame)?,
            track_id: None,
            kind: RecordKind::Tag,
            label: self.labels.label_name(tag.label_id)?.to_string(),
            attributes: non_empty(self.labels.resolve_attributes(&tag.attributes)?),
            points: None,
            bbox: None,
        })
    }

    /// Returns `Ok(None)` for unsupported geometry, after recording it in `sink`.
    pub fn normalize_shape(
        &self,
        shape: &Shape,
        sink: &mut ErrorSink,
    ) -> Result<Option<ExportRecord>, CvatError> {
        let Some(kind) = supported_kind(&shape.shape_type, sink) else {
            return Ok(None);
        };
        let (points, bbox) = self.geometry(kind, &shape.points);
        Ok(Some(ExportRecord {
            image_id: self.image_id(shape.frame)?,
            track_id: None,
            kind,
            label: self.labels.label_name(shape.label_id)?.to_string(),
            attributes: non_empty(self.labels.resolve_attributes(&shape.attributes)?),
            points,
            bbox,
        }))
    }

    /// One record per supported track shape. Track attributes act as
    /// defaults; a shape's own attributes win on name collisions.
    pub fn normalize_track(
        &self,
        track: &Track,
        sink: &mut ErrorSink,
    ) -> Result<Vec<ExportRecord>, CvatError> {
        let label = self.labels.label_name(track.label_id)?;
        let track_attributes = self.labels.resolve_attributes(&track.attributes)?;

        let mut records = Vec::with_capacity(track.shapes.len());
        for shape in &track.shapes {
            let Some(kind) = supported_kind(&shape.shape_type, sink) else {
                continue;
            };
            let mut attributes = track_attributes.clone();
            attributes.extend(self.labels.resolve_attributes(&shape.attributes)?);
            let (points, bbox) = self.geometry(kind, &shape.points);
            records.push(ExportRecord {
                image_id: self.image_id(shape.frame)?,
                track_id: Some(track.id),
                kind,
                label: label.to_string(),
                attributes: non_empty(attributes),
                points,
                bbox,
            });
        }
        Ok(records)
    }

    fn image_id(&self, frame: u32) -> Result<String, CvatError> {
        self.frames
            .get(frame)
            .map(|f| f.id.clone())
            .ok_or(CvatError::UnknownFrame { frame })
    }

    fn geometry(&self, kind: RecordKind, points: &[f64]) -> (Option<Vec<f64>>, Option<BBox>) {
        let bbox = if kind == RecordKind::Polygon && self.options.bboxes {
            polygon_to_bbox(points)
        } else {
            None
        };
        let points = self.options.keeps_points(kind).then(|| points.to_vec());
        (points, bbox)
    }
}

fn supported_kind(shape_type: &ShapeType, sink: &mut ErrorSink) -> Option<RecordKind> {
    let kind = RecordKind::from_shape_type(shape_type);
    if kind.is_none() {
        sink.record(format!("Unknown annotation type: {shape_type}"));
    }
    kind
}

fn non_empty(attributes: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!attributes.is_empty()).then_some(attributes)
}
