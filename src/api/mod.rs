//! Typed access to the annotation server's REST API.
//!
//! [`ApiClient`] builds endpoint URLs from a [`ClientConfig`] and decodes
//! responses into the models in [`models`]. All network traffic goes through
//! a [`Transport`], so tests can serve canned payloads.

pub mod ids;
pub mod models;
pub mod pagination;
pub mod transport;

use crate::config::ClientConfig;
use crate::error::CvatError;

use ids::{JobId, ProjectId, TaskId};
use models::{Annotations, Job, Label, Project, Task, TaskMeta};
use pagination::{ApiResource, PagedFetcher};
use transport::{HttpResponse, StreamResponse, Transport};

/// Export format requested for dataset archives.
pub const DATASET_EXPORT_FORMAT: &str = "CVAT for images 1.1";

/// Client for one server.
pub struct ApiClient<T: Transport> {
    transport: T,
    config: ClientConfig,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch a project and the ids of all its tasks.
    pub fn project(&self, project_id: ProjectId) -> Result<Project, CvatError> {
        let mut project: Project =
            self.get_json(&self.endpoint(&format!("api/projects/{project_id}"))?, &[])?;
        let project_param = project_id.to_string();
        let tasks: Vec<Task> = self.fetch_paged("api/tasks", &[("project_id", &project_param)])?;
        project.task_ids = tasks.into_iter().map(|task| task.id).collect();
        Ok(project)
    }

    pub fn task(&self, task_id: TaskId) -> Result<Task, CvatError> {
        self.get_json(&self.endpoint(&format!("api/tasks/{task_id}"))?, &[])
    }

    pub fn task_meta(&self, task_id: TaskId) -> Result<TaskMeta, CvatError> {
        self.get_json(&self.endpoint(&format!("api/tasks/{task_id}/data/meta"))?, &[])
    }

    /// All jobs of a task, ordered by their first frame.
    pub fn task_jobs(&self, task_id: TaskId) -> Result<Vec<Job>, CvatError> {
        let task_param = task_id.to_string();
        let mut jobs: Vec<Job> = self.fetch_paged("api/jobs", &[("task_id", &task_param)])?;
        jobs.sort_by_key(|job| (job.start_frame, job.id));
        Ok(jobs)
    }

    /// Label definitions visible to a task (its own or its project's).
    pub fn task_labels(&self, task_id: TaskId) -> Result<Vec<Label>, CvatError> {
        let task_param = task_id.to_string();
        self.fetch_paged("api/labels", &[("task_id", &task_param)])
    }

    pub fn job_annotations(&self, job_id: JobId) -> Result<Annotations, CvatError> {
        self.get_json(&self.endpoint(&format!("api/jobs/{job_id}/annotations"))?, &[])
    }

    /// Ask the server to prepare (or report the state of) a task's dataset
    /// archive. The raw response is returned so the caller can drive polling.
    pub fn request_dataset(&self, task_id: TaskId) -> Result<HttpResponse, CvatError> {
        let url = self.dataset_url(task_id)?;
        self.transport
            .get(&url, &[("format", DATASET_EXPORT_FORMAT)])
    }

    /// Stream a prepared dataset archive.
    pub fn download_dataset(&self, task_id: TaskId) -> Result<StreamResponse, CvatError> {
        let url = self.dataset_url(task_id)?;
        let response = self.transport.get_stream(
            &url,
            &[("format", DATASET_EXPORT_FORMAT), ("action", "download")],
        )?;
        if !(200..300).contains(&response.status) {
            return Err(CvatError::HttpStatus {
                url,
                status: response.status,
                body: String::new(),
            });
        }
        Ok(response)
    }

    pub fn dataset_url(&self, task_id: TaskId) -> Result<String, CvatError> {
        self.endpoint(&format!("api/tasks/{task_id}/dataset"))
    }

    fn endpoint(&self, path: &str) -> Result<String, CvatError> {
        self.config.endpoint(path)
    }

    fn fetch_paged<R: ApiResource>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<R>, CvatError> {
        let url = self.endpoint(path)?;
        let page_size = self.config.page_size.to_string();
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("page_size", &page_size));
        PagedFetcher::new(&self.transport).fetch_all(&url, &all_params)
    }

    fn get_json<R: ApiResource>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<R, CvatError> {
        let response = self.transport.get(url, params)?;
        if !matches!(response.status, 200..=202) {
            return Err(CvatError::HttpStatus {
                url: url.to_string(),
                status: response.status,
                body: response.body_text(),
            });
        }
        serde_json::from_slice(&response.body).map_err(|source| CvatError::Decode {
            resource: R::KIND,
            url: url.to_string(),
            source,
        })
    }
}
