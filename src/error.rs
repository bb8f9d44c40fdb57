use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api::ids::{AttributeId, JobId, LabelId, TaskId};
use crate::report::ErrorSink;

/// The main error type for cvatkit operations.
///
/// Every variant except [`CvatError::CompletedWithErrors`] is fatal for the
/// run: it signals either a transport failure or a structural inconsistency
/// between the resources returned by the server.
#[derive(Debug, Error)]
pub enum CvatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing setting '{name}': {hint}")]
    MissingSetting { name: &'static str, hint: String },

    #[error("Invalid setting '{name}': {message}")]
    InvalidSetting { name: &'static str, message: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} returned HTTP {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {resource} from {url}: {source}")]
    Decode {
        resource: &'static str,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Paginated collection {url} declared {expected} item(s) but returned {actual}")]
    PageCountMismatch {
        url: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Task {task_id}: segment [{start_frame}, {stop_frame}] owns {jobs} job(s); expected exactly one"
    )]
    SegmentJobCount {
        task_id: TaskId,
        start_frame: u32,
        stop_frame: u32,
        jobs: usize,
    },

    #[error(
        "Task {task_id}: job {job_id} references frame {frame} which the task metadata does not describe"
    )]
    JobFrameMissing {
        task_id: TaskId,
        job_id: JobId,
        frame: u32,
    },

    #[error("Task {task_id}: frame {frame} is claimed by both job {first} and job {second}")]
    OverlappingJobs {
        task_id: TaskId,
        frame: u32,
        first: JobId,
        second: JobId,
    },

    #[error("Task {task_id}: frame {frame} is not covered by any job")]
    FrameWithoutJob { task_id: TaskId, frame: u32 },

    #[error("Unknown label id {label_id}: label metadata and annotations are out of sync")]
    UnknownLabel { label_id: LabelId },

    #[error("Unknown attribute id {spec_id}: label metadata and annotations are out of sync")]
    UnknownAttribute { spec_id: AttributeId },

    #[error("Annotation references frame {frame} which is not part of the frame table")]
    UnknownFrame { frame: u32 },

    #[error("Invalid RLE mask: {message}")]
    InvalidRle { message: String },

    #[error("Invalid polygon: {message}")]
    InvalidPolygon { message: String },

    #[error("Contour has {points} point(s); at least three are needed to build a polygon")]
    ContourTooSmall { points: usize },

    #[error("Dimension mismatch: {message}")]
    DimensionMismatch { message: String },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Dataset export for task {task_id} was cancelled")]
    ExportCancelled { task_id: TaskId },

    #[error("Dataset export for task {task_id} was not ready after {waited:?}")]
    ExportTimedOut { task_id: TaskId, waited: Duration },

    #[error("Failed to read dataset archive: {source}")]
    Archive {
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to start worker pool: {message}")]
    WorkerPool { message: String },

    #[error("Invalid split parameters: {message}")]
    InvalidSplitParams { message: String },

    #[error("Export completed with {error_count} non-fatal error(s)")]
    CompletedWithErrors {
        error_count: usize,
        errors: ErrorSink,
    },
}
