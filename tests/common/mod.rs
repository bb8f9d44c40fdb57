#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::Mutex;

use cvatkit::api::transport::{HttpResponse, StreamResponse, Transport};
use cvatkit::api::ApiClient;
use cvatkit::config::ClientConfig;
use cvatkit::CvatError;
use serde_json::{json, Value};

pub const HOST: &str = "http://cvat.test/";

/// Query parameters that select a resource. Paging and format parameters
/// are left out of request keys.
const KEY_PARAMS: [&str; 2] = ["task_id", "project_id"];

/// In-memory server keyed by `url` plus its selecting query parameters,
/// e.g. `http://cvat.test/api/jobs?task_id=1`.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    streams: Mutex<HashMap<String, (u16, Option<u64>, Vec<u8>)>>,
    requests: Mutex<Vec<String>>,
}

fn request_key(url: &str, params: &[(&str, &str)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter(|(name, _)| KEY_PARAMS.contains(name))
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{}", query.join("&"))
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `value` with status 200 on every request to `key`.
    pub fn json(&self, key: &str, value: Value) {
        self.sequence(
            key,
            vec![HttpResponse {
                status: 200,
                body: serde_json::to_vec(&value).unwrap(),
            }],
        );
    }

    /// Serve `responses` in order; the last one repeats.
    pub fn sequence(&self, key: &str, responses: Vec<HttpResponse>) {
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), responses.into());
    }

    pub fn statuses(&self, key: &str, statuses: &[u16]) {
        self.sequence(
            key,
            statuses
                .iter()
                .map(|&status| HttpResponse {
                    status,
                    body: b"{}".to_vec(),
                })
                .collect(),
        );
    }

    pub fn stream(&self, key: &str, content_length: Option<u64>, body: Vec<u8>) {
        self.streams
            .lock()
            .unwrap()
            .insert(key.to_string(), (200, content_length, body));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, key: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|k| *k == key)
            .count()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, CvatError> {
        let key = request_key(url, params);
        self.requests.lock().unwrap().push(key.clone());

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap()),
            Some(queue) if !queue.is_empty() => Ok(queue[0].clone()),
            _ => Ok(HttpResponse {
                status: 404,
                body: format!("no fixture for {key}").into_bytes(),
            }),
        }
    }

    fn get_stream(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<StreamResponse, CvatError> {
        let key = request_key(url, params);
        self.requests.lock().unwrap().push(format!("stream {key}"));

        match self.streams.lock().unwrap().get(&key) {
            Some((status, content_length, body)) => Ok(StreamResponse {
                status: *status,
                content_length: *content_length,
                reader: Box::new(Cursor::new(body.clone())),
            }),
            None => Ok(StreamResponse {
                status: 404,
                content_length: Some(0),
                reader: Box::new(std::io::empty()),
            }),
        }
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::from_lookup(
        |key| match key {
            "CVAT_HOST" => Some(HOST.to_string()),
            "CVAT_TOKEN" => Some("test-token".to_string()),
            _ => None,
        },
        true,
    )
    .unwrap()
}

pub fn client(mock: MockTransport) -> ApiClient<MockTransport> {
    ApiClient::new(mock, config())
}

pub fn page(results: Vec<Value>) -> Value {
    json!({"count": results.len(), "next": null, "previous": null, "results": results})
}

/// Labels shared by all fixture tasks: `car` (attribute `color`) and
/// `person` (attribute `pose`).
pub fn labels() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "car", "attributes": [{"id": 10, "name": "color"}]}),
        json!({"id": 2, "name": "person", "attributes": [{"id": 11, "name": "pose"}]}),
    ]
}

/// A job as `(id, start_frame, stop_frame, status)`.
pub type JobSpec<'a> = (u64, u32, u32, &'a str);

/// Register task `task_id` with `frames` (all 4x3 pixels) split into `jobs`.
/// Every job starts with empty annotations.
pub fn add_task(mock: &MockTransport, task_id: u64, frames: &[&str], jobs: &[JobSpec<'_>]) {
    let segments: Vec<Value> = jobs
        .iter()
        .map(|(id, start, stop, status)| {
            json!({"start_frame": start, "stop_frame": stop, "jobs": [{"id": id, "status": status}]})
        })
        .collect();
    mock.json(
        &format!("{HOST}api/tasks/{task_id}"),
        json!({"id": task_id, "name": format!("task-{task_id}"), "status": "annotation", "segments": segments}),
    );

    let frame_meta: Vec<Value> = frames
        .iter()
        .map(|name| json!({"width": 4, "height": 3, "name": name}))
        .collect();
    mock.json(
        &format!("{HOST}api/tasks/{task_id}/data/meta"),
        json!({
            "start_frame": 0,
            "stop_frame": frames.len().saturating_sub(1),
            "size": frames.len(),
            "frames": frame_meta,
        }),
    );

    let job_list: Vec<Value> = jobs
        .iter()
        .map(|(id, start, stop, status)| {
            json!({
                "id": id,
                "task_id": task_id,
                "status": status,
                "stage": "annotation",
                "state": "new",
                "start_frame": start,
                "stop_frame": stop,
            })
        })
        .collect();
    mock.json(&format!("{HOST}api/jobs?task_id={task_id}"), page(job_list));
    mock.json(&format!("{HOST}api/labels?task_id={task_id}"), page(labels()));

    for (id, ..) in jobs {
        set_annotations(mock, *id, json!({"version": 0, "tags": [], "shapes": [], "tracks": []}));
    }
}

pub fn set_annotations(mock: &MockTransport, job_id: u64, annotations: Value) {
    mock.json(&format!("{HOST}api/jobs/{job_id}/annotations"), annotations);
}

pub fn dataset_key(task_id: u64) -> String {
    format!("{HOST}api/tasks/{task_id}/dataset")
}

/// A zip archive holding `entries` as `(path, bytes)`.
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal 24-bit BMP of the given size.
pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&[0; 24]);

    bytes.resize(file_size as usize, 0);
    bytes
}
