//! Dataset export polling and image download.
//!
//! Images are not served frame by frame: the server packs a task into a
//! dataset archive on request. Preparing it takes a while, so the client
//! polls until the archive is ready, streams it down, extracts the images
//! and moves each one next to the exported metadata.
//!
//! Polling is a small state machine (`Requested → Processing → Ready`) driven
//! by an injected [`Clock`], so tests run without real delays. A deadline and
//! a cancellation flag bound the otherwise endless wait.

pub mod archive;

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::ids::TaskId;
use crate::api::transport::{HttpResponse, Transport};
use crate::api::ApiClient;
use crate::error::CvatError;
use crate::reconcile::{image_id_from_name, Frame};
use crate::report::ErrorSink;

/// Archives up to this size (by `content-length`) are buffered in memory.
pub const DEFAULT_MEMORY_THRESHOLD: u64 = 512 * 1024 * 1024;

/// Pause between two readiness checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Lifecycle of a server-side dataset export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    Requested,
    Processing,
    Ready,
}

impl ExportState {
    /// The state after observing `outcome`.
    pub fn advance(self, outcome: PollOutcome) -> Self {
        match (self, outcome) {
            (_, PollOutcome::Ready) => ExportState::Ready,
            (ExportState::Ready, _) => ExportState::Ready,
            (_, PollOutcome::Processing) => ExportState::Processing,
            (state, PollOutcome::Retry) => state,
        }
    }
}

/// What one readiness response means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// `201`: the archive can be downloaded.
    Ready,
    /// `202`: the server is still building the archive.
    Processing,
    /// `5xx`: transient server failure, ask again later.
    Retry,
}

impl PollOutcome {
    /// Classify a readiness response. Any status other than 201, 202 or 5xx
    /// is fatal.
    pub fn classify(url: &str, response: &HttpResponse) -> Result<Self, CvatError> {
        match response.status {
            201 => Ok(PollOutcome::Ready),
            202 => Ok(PollOutcome::Processing),
            500..=599 => Ok(PollOutcome::Retry),
            status => Err(CvatError::HttpStatus {
                url: url.to_string(),
                status,
                body: response.body_text(),
            }),
        }
    }
}

/// Time source for polling.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How long and how often to poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Give up after this long. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

/// Waits for a task's dataset archive to become ready.
pub struct ExportPoller {
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl ExportPoller {
    pub fn new(clock: Arc<dyn Clock>, policy: PollPolicy) -> Self {
        Self {
            clock,
            policy,
            cancel: None,
        }
    }

    /// Stop waiting once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Poll until the export of `task_id` is ready.
    ///
    /// Server errors (5xx) are logged and retried; they never fail the wait
    /// on their own.
    pub fn wait_ready<T: Transport>(
        &self,
        client: &ApiClient<T>,
        task_id: TaskId,
    ) -> Result<(), CvatError> {
        let url = client.dataset_url(task_id)?;
        let started = self.clock.now();
        let mut state = ExportState::Requested;

        loop {
            if self.cancelled() {
                return Err(CvatError::ExportCancelled { task_id });
            }

            let response = client.request_dataset(task_id)?;
            let outcome = PollOutcome::classify(&url, &response)?;
            if outcome == PollOutcome::Retry {
                log::error!(
                    "Task {task_id}: export request returned {} with content: {}",
                    response.status,
                    response.body_text()
                );
            }

            let next = state.advance(outcome);
            if next != state {
                log::debug!("Task {task_id}: export {state:?} -> {next:?}");
            }
            state = next;
            if state == ExportState::Ready {
                return Ok(());
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if let Some(deadline) = self.policy.deadline {
                if waited >= deadline {
                    return Err(CvatError::ExportTimedOut { task_id, waited });
                }
            }
            self.clock.sleep(self.policy.interval);
        }
    }
}

/// A downloaded archive, buffered in memory or spilled to a temp file.
#[derive(Debug)]
pub enum ArchiveBody {
    Memory(Cursor<Vec<u8>>),
    Spilled(File),
}

impl ArchiveBody {
    pub fn is_spilled(&self) -> bool {
        matches!(self, ArchiveBody::Spilled(_))
    }
}

impl Read for ArchiveBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ArchiveBody::Memory(cursor) => cursor.read(buf),
            ArchiveBody::Spilled(file) => file.read(buf),
        }
    }
}

impl Seek for ArchiveBody {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ArchiveBody::Memory(cursor) => cursor.seek(pos),
            ArchiveBody::Spilled(file) => file.seek(pos),
        }
    }
}

/// Download the dataset archive of `task_id`.
///
/// Bodies with a known length up to `memory_threshold` bytes stay in memory;
/// larger or unsized ones go to an anonymous temp file.
pub fn fetch_archive<T: Transport>(
    client: &ApiClient<T>,
    task_id: TaskId,
    memory_threshold: u64,
) -> Result<ArchiveBody, CvatError> {
    let mut response = client.download_dataset(task_id)?;
    match response.content_length {
        Some(length) if length <= memory_threshold => {
            let mut buffer = Vec::with_capacity(length as usize);
            response.reader.read_to_end(&mut buffer)?;
            Ok(ArchiveBody::Memory(Cursor::new(buffer)))
        }
        length => {
            log::debug!("Task {task_id}: spilling archive of {length:?} byte(s) to disk");
            let mut file = tempfile::tempfile()?;
            io::copy(&mut response.reader, &mut file)?;
            file.seek(SeekFrom::Start(0))?;
            Ok(ArchiveBody::Spilled(file))
        }
    }
}

/// Where and how downloaded images are stored.
#[derive(Clone, Debug)]
pub struct ImageDownloadOptions {
    /// Export directory; images go to its `images/` subdirectory.
    pub output_dir: PathBuf,
    /// Keep the archive's relative paths instead of `task-{id}/{image_id}.{ext}`.
    pub keep_original_paths: bool,
    pub memory_threshold: u64,
    pub poll: PollPolicy,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ImageDownloadOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            keep_original_paths: false,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            poll: PollPolicy::default(),
            cancel: None,
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join("images")
    }
}

/// Downloads task images and attaches their paths to frames.
pub struct ImageDownloader {
    options: ImageDownloadOptions,
    clock: Arc<dyn Clock>,
}

impl ImageDownloader {
    pub fn new(options: ImageDownloadOptions) -> Self {
        Self {
            options,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &ImageDownloadOptions {
        &self.options
    }

    /// Fetch the images of `task_id` and set `file_path` on every matching
    /// frame (relative to the images directory).
    ///
    /// Frames without an image in the archive, and images whose header
    /// dimensions disagree with the frame, are recorded in `sink`.
    pub fn download_task_images<T: Transport>(
        &self,
        client: &ApiClient<T>,
        task_id: TaskId,
        frames: &mut [Frame],
        sink: &mut ErrorSink,
    ) -> Result<(), CvatError> {
        let mut poller = ExportPoller::new(Arc::clone(&self.clock), self.options.poll);
        if let Some(flag) = &self.options.cancel {
            poller = poller.with_cancel(Arc::clone(flag));
        }
        poller.wait_ready(client, task_id)?;

        let body = fetch_archive(client, task_id, self.options.memory_threshold)?;

        let images_dir = self.options.images_dir();
        fs::create_dir_all(&images_dir)?;
        // Removed on drop, whichever way this function returns.
        let staging = tempfile::Builder::new()
            .prefix(".images-tmp-")
            .tempdir_in(&self.options.output_dir)?;

        let extracted = archive::extract_images(body, staging.path())?;
        let by_image_id: HashMap<String, (String, &PathBuf)> = extracted
            .iter()
            .map(|path| {
                let relative = archive_relative(path);
                (image_id_from_name(&relative), (relative, path))
            })
            .collect();

        let mut placed_ids: HashSet<String> = HashSet::new();
        for frame in frames.iter_mut() {
            let Some((relative, entry)) = by_image_id.get(&frame.id) else {
                sink.record(format!("Some images in task {task_id} were not downloaded."));
                frame.file_path = None;
                continue;
            };
            if !placed_ids.insert(frame.id.clone()) {
                log::warn!(
                    "Task {task_id}: frame {} reuses image id {}, already placed",
                    frame.frame,
                    frame.id
                );
                sink.record(format!("Duplicate image ids in task {task_id}."));
                frame.file_path = None;
                continue;
            }

            let file_path = if self.options.keep_original_paths {
                relative.clone()
            } else {
                let ext = extension_of(&frame.file_name)
                    .or_else(|| extension_of(relative))
                    .unwrap_or_default();
                format!("task-{task_id}/{}.{ext}", frame.id)
            };

            let source = staging.path().join(entry);
            let target = images_dir.join(&file_path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&source, &target)?;

            check_dimensions(&target, frame, task_id, sink);
            frame.file_path = Some(file_path);
        }

        log::info!(
            "Task {task_id}: placed {} of {} image(s) in {}",
            placed_ids.len(),
            frames.len(),
            images_dir.display()
        );
        Ok(())
    }
}

/// Archive entry path with `/` separators and the leading `images/` removed.
fn archive_relative(path: &Path) -> String {
    let joined = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    match joined.strip_prefix("images/") {
        Some(rest) => rest.to_string(),
        None => joined,
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
}

fn check_dimensions(path: &Path, frame: &Frame, task_id: TaskId, sink: &mut ErrorSink) {
    match imagesize::size(path) {
        Ok(size) => {
            if size.width != frame.width as usize || size.height != frame.height as usize {
                log::warn!(
                    "{}: image is {}x{}, metadata says {}x{}",
                    path.display(),
                    size.width,
                    size.height,
                    frame.width,
                    frame.height
                );
                sink.record(format!("Image size mismatch in task {task_id}."));
            }
        }
        Err(source) => {
            log::warn!("{}: cannot read image header: {source}", path.display());
        }
    }
}
