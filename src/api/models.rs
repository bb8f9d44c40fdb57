//! Typed models of the server's REST resources.
//!
//! Payloads are decoded straight into these structs at the fetch boundary, so
//! a missing required field or a wrong value type is reported as a
//! [`CvatError::Decode`](crate::CvatError::Decode) instead of drifting
//! silently through the pipeline. Unknown extra fields are ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{AttributeId, JobId, LabelId, ProjectId, TaskId};
use super::pagination::ApiResource;

/// One page of a paginated collection.
#[derive(Clone, Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Total number of items across all pages, as declared by the server.
    pub count: usize,

    /// URL of the next page, or `None` on the last page.
    #[serde(default)]
    pub next: Option<String>,

    /// Items on this page.
    #[serde(default)]
    pub results: Vec<T>,
}

/// A project snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,

    /// Tasks belonging to the project, filled from the task listing.
    #[serde(skip_deserializing, default)]
    pub task_ids: Vec<TaskId>,
}

impl ApiResource for Project {
    const KIND: &'static str = "project";
}

/// A task record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,

    /// Frame ranges of the task, each owning the jobs that annotate it.
    ///
    /// Older servers embed segments in the task record; newer ones omit them
    /// and only expose jobs through the job listing.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl ApiResource for Task {
    const KIND: &'static str = "task";
}

/// A contiguous frame range of a task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    pub start_frame: u32,
    pub stop_frame: u32,
    #[serde(default)]
    pub jobs: Vec<SegmentJob>,
}

/// Job reference embedded in a segment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentJob {
    pub id: JobId,
    #[serde(default)]
    pub status: Option<String>,
}

/// A job, as returned by the job listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task_id: TaskId,
    pub status: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub state: Option<String>,

    /// First frame owned by the job.
    pub start_frame: u32,

    /// Last frame owned by the job (inclusive).
    pub stop_frame: u32,
}

impl Job {
    /// Returns true if the job's status is `completed`.
    pub fn is_completed(&self) -> bool {
        self.status == JOB_STATUS_COMPLETED
    }
}

impl ApiResource for Job {
    const KIND: &'static str = "job";
}

/// Job status marking finished work.
pub const JOB_STATUS_COMPLETED: &str = "completed";

/// Per-task media metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskMeta {
    pub start_frame: u32,
    pub stop_frame: u32,
    #[serde(default)]
    pub size: Option<u32>,
    pub frames: Vec<FrameMeta>,
}

impl ApiResource for TaskMeta {
    const KIND: &'static str = "task metadata";
}

/// Dimensions and file name of one frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
    pub name: String,
}

/// A label definition with its attribute specifications.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
}

impl ApiResource for Label {
    const KIND: &'static str = "label";
}

/// An attribute specification of a label.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub id: AttributeId,
    pub name: String,
}

/// All annotations of a job.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl ApiResource for Annotations {
    const KIND: &'static str = "annotations";
}

/// A value assigned to an attribute specification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub spec_id: AttributeId,
    pub value: String,
}

/// A frame-level label.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: Option<u64>,
    pub frame: u32,
    pub label_id: LabelId,
    #[serde(default)]
    pub group: Option<u64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
}

/// A single-frame geometric annotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shape {
    #[serde(default)]
    pub id: Option<u64>,
    pub frame: u32,
    pub label_id: LabelId,
    #[serde(rename = "type")]
    pub shape_type: ShapeType,
    #[serde(default)]
    pub points: Vec<f64>,
    #[serde(default)]
    pub occluded: bool,
    #[serde(default)]
    pub z_order: i32,
    #[serde(default)]
    pub group: Option<u64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
}

/// A multi-frame annotation: one label followed across frames.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub frame: u32,
    pub label_id: LabelId,
    #[serde(default)]
    pub group: Option<u64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
    #[serde(default)]
    pub shapes: Vec<TrackShape>,
}

/// The geometry of a track on one frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackShape {
    #[serde(default)]
    pub id: Option<u64>,
    pub frame: u32,
    #[serde(rename = "type")]
    pub shape_type: ShapeType,
    #[serde(default)]
    pub points: Vec<f64>,
    #[serde(default)]
    pub occluded: bool,
    #[serde(default)]
    pub outside: bool,
    #[serde(default)]
    pub z_order: i32,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
}

/// Geometry type of a shape.
///
/// Types the exporter does not flatten (masks, ellipses, cuboids, skeletons)
/// are kept verbatim in [`ShapeType::Other`] so they can be reported.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShapeType {
    Points,
    Polyline,
    Polygon,
    Rectangle,
    Mask,
    Other(String),
}

impl ShapeType {
    pub fn as_str(&self) -> &str {
        match self {
            ShapeType::Points => "points",
            ShapeType::Polyline => "polyline",
            ShapeType::Polygon => "polygon",
            ShapeType::Rectangle => "rectangle",
            ShapeType::Mask => "mask",
            ShapeType::Other(name) => name,
        }
    }
}

impl From<String> for ShapeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "points" => ShapeType::Points,
            "polyline" => ShapeType::Polyline,
            "polygon" => ShapeType::Polygon,
            "rectangle" => ShapeType::Rectangle,
            "mask" => ShapeType::Mask,
            _ => ShapeType::Other(value),
        }
    }
}

impl From<ShapeType> for String {
    fn from(value: ShapeType) -> Self {
        match value {
            ShapeType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
