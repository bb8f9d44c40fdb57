//! Dataset assembly across tasks.
//!
//! [`reconcile_and_normalize`] turns one task into frames and export records.
//! [`DatasetAssembler`] runs it for a list of tasks on a bounded worker pool,
//! optionally downloads images, and merges everything into one
//! [`ExportPayload`] plus the run's [`ErrorSink`].

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::ids::TaskId;
use crate::api::transport::Transport;
use crate::api::ApiClient;
use crate::error::CvatError;
use crate::export::ImageDownloader;
use crate::normalize::{ExportRecord, LabelMap, NormalizeOptions, Normalizer};
use crate::reconcile::{jobs_for_task, reconcile_frames, Frame};
use crate::report::ErrorSink;

/// Date format of [`ExportInfo::date_created`].
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Options of an export run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub normalize: NormalizeOptions,
    /// Include frames and annotations of jobs that are not completed.
    pub all_jobs: bool,
    /// Tasks processed concurrently.
    pub workers: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            normalize: NormalizeOptions::default(),
            all_jobs: false,
            workers: 1,
        }
    }
}

impl ExportOptions {
    /// Enable every annotation kind when none was selected.
    pub fn with_default_selection(mut self) -> Self {
        if self.normalize.is_empty() {
            log::warn!(
                "None of the filter arguments (points, polylines, polygons, bboxes, rectangles, tags) \
                 were selected. Exporting all supported annotation types."
            );
            self.normalize = NormalizeOptions::all();
        }
        self
    }
}

/// Frames and records of one task.
#[derive(Clone, Debug)]
pub struct TaskExport {
    pub task_id: TaskId,
    pub frames: Vec<Frame>,
    pub records: Vec<ExportRecord>,
    pub errors: ErrorSink,
}

/// Header of the export payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub task_ids: Vec<TaskId>,
    pub date_created: String,
}

impl ExportInfo {
    /// Info stamped with today's local date.
    pub fn today(task_ids: Vec<TaskId>) -> Self {
        Self {
            task_ids,
            date_created: chrono::Local::now().format(DATE_FORMAT).to_string(),
        }
    }
}

/// The exported dataset, as written to `metadata.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportPayload {
    pub info: ExportInfo,
    pub images: Vec<Frame>,
    pub annotations: Vec<ExportRecord>,
}

/// Result of a run: the payload and everything that was left out of it.
#[derive(Clone, Debug)]
pub struct AssembledDataset {
    pub payload: ExportPayload,
    pub errors: ErrorSink,
}

/// Fetch, reconcile and normalize one task.
///
/// Unless `options.all_jobs` is set, only frames and annotations of
/// completed jobs are kept.
pub fn reconcile_and_normalize<T: Transport>(
    client: &ApiClient<T>,
    task_id: TaskId,
    options: &ExportOptions,
) -> Result<TaskExport, CvatError> {
    let task = client.task(task_id)?;
    let meta = client.task_meta(task_id)?;
    let listed = client.task_jobs(task_id)?;
    let labels = LabelMap::from_labels(&client.task_labels(task_id)?);

    let jobs = jobs_for_task(&task, &listed)?;
    let mut table = reconcile_frames(&task, &meta, &jobs)?;
    if !options.all_jobs {
        table.retain_completed();
    }

    let mut errors = ErrorSink::new();
    let mut records = Vec::new();
    let normalizer = Normalizer::new(&table, &labels, options.normalize);
    for job in &jobs {
        if !options.all_jobs && !job.is_completed() {
            log::debug!("Task {task_id}: skipping job {} ({})", job.id, job.status);
            continue;
        }
        let annotations = client.job_annotations(job.id)?;
        records.extend(normalizer.normalize_annotations(&annotations, &mut errors)?);
    }

    log::info!(
        "Task {task_id} '{}': {} frame(s), {} annotation(s)",
        task.name,
        table.len(),
        records.len()
    );

    Ok(TaskExport {
        task_id,
        frames: table.into_frames(),
        records,
        errors,
    })
}

/// Runs the export over many tasks.
pub struct DatasetAssembler<'a, T: Transport> {
    client: &'a ApiClient<T>,
    options: ExportOptions,
    images: Option<ImageDownloader>,
    progress: bool,
}

impl<'a, T: Transport> DatasetAssembler<'a, T> {
    pub fn new(client: &'a ApiClient<T>, options: ExportOptions) -> Self {
        Self {
            client,
            options,
            images: None,
            progress: false,
        }
    }

    /// Also download each task's images.
    pub fn with_images(mut self, downloader: ImageDownloader) -> Self {
        self.images = Some(downloader);
        self
    }

    /// Show a progress bar on stderr.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Process every task and merge the results in input order.
    ///
    /// The first fatal error aborts the run. Non-fatal errors of all tasks
    /// are merged into [`AssembledDataset::errors`].
    pub fn run(&self, task_ids: &[TaskId]) -> Result<AssembledDataset, CvatError> {
        log::info!("Processing tasks: {task_ids:?}");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.max(1))
            .build()
            .map_err(|source| CvatError::WorkerPool {
                message: source.to_string(),
            })?;

        let bar = self.progress_bar(task_ids.len());
        let exports: Vec<TaskExport> = pool.install(|| {
            task_ids
                .par_iter()
                .map(|&task_id| {
                    let export = self.process_task(task_id);
                    bar.inc(1);
                    export
                })
                .collect::<Result<Vec<_>, CvatError>>()
        })?;
        bar.finish_and_clear();

        let mut payload = ExportPayload {
            info: ExportInfo::today(task_ids.to_vec()),
            images: Vec::new(),
            annotations: Vec::new(),
        };
        let mut errors = ErrorSink::new();
        for export in exports {
            payload.images.extend(export.frames);
            payload.annotations.extend(export.records);
            errors.merge(export.errors);
        }

        if errors.is_empty() {
            log::info!(
                "Exported {} image(s) and {} annotation(s)",
                payload.images.len(),
                payload.annotations.len()
            );
        } else {
            log::warn!("Export finished with omissions:\n{errors}");
        }

        Ok(AssembledDataset { payload, errors })
    }

    fn process_task(&self, task_id: TaskId) -> Result<TaskExport, CvatError> {
        let mut export = reconcile_and_normalize(self.client, task_id, &self.options)?;
        if let Some(downloader) = &self.images {
            downloader.download_task_images(
                self.client,
                task_id,
                &mut export.frames,
                &mut export.errors,
            )?;
        }
        Ok(export)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tasks ({eta})",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar
    }
}
