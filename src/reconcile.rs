//! Task/job/frame reconciliation.
//!
//! A task's frames are described by three independent resources: the
//! segments embedded in the task record, the job listing, and the media
//! metadata. [`reconcile_frames`] folds them into one [`FrameTable`] where
//! every frame knows its dimensions, file name and owning job, and fails
//! loudly when the resources disagree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::ids::{JobId, TaskId};
use crate::api::models::{Job, Task, TaskMeta, JOB_STATUS_COMPLETED};
use crate::error::CvatError;

/// One image of a task, with its owning job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Global image identifier, derived from the file name.
    pub id: String,
    /// Task-local frame index.
    pub frame: u32,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub task_id: TaskId,
    pub task_name: String,
    pub job_id: JobId,
    /// Status of the owning job.
    pub status: String,
    /// Where the downloaded image was placed, relative to the `images/` directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Frame {
    pub fn is_completed(&self) -> bool {
        self.status == JOB_STATUS_COMPLETED
    }
}

/// Frames of one task keyed by frame index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameTable {
    frames: BTreeMap<u32, Frame>,
}

impl FrameTable {
    pub fn get(&self, frame: u32) -> Option<&Frame> {
        self.frames.get(&frame)
    }

    pub fn get_mut(&mut self, frame: u32) -> Option<&mut Frame> {
        self.frames.get_mut(&frame)
    }

    pub fn contains(&self, frame: u32) -> bool {
        self.frames.contains_key(&frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Frame> {
        self.frames.values_mut()
    }

    /// Keep only frames owned by completed jobs.
    pub fn retain_completed(&mut self) {
        self.frames.retain(|_, frame| frame.is_completed());
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames.into_values().collect()
    }
}

/// Image identifier for a media file name: the path without the extension of
/// its last component (`"dir/img_01.jpg"` → `"dir/img_01"`).
pub fn image_id_from_name(name: &str) -> String {
    let (dir, base) = match name.rsplit_once('/') {
        Some((dir, base)) => (Some(dir), base),
        None => (None, name),
    };
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}"),
        None => stem.to_string(),
    }
}

/// Last path component of a media file name.
fn file_name_of(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// The jobs annotating `task`, checking that each segment owns exactly one.
///
/// `listed` is the task's job listing. Servers that do not list jobs (empty
/// listing) still embed them in the segments; those are used instead.
pub fn jobs_for_task(task: &Task, listed: &[Job]) -> Result<Vec<Job>, CvatError> {
    for segment in &task.segments {
        if segment.jobs.len() != 1 {
            return Err(CvatError::SegmentJobCount {
                task_id: task.id,
                start_frame: segment.start_frame,
                stop_frame: segment.stop_frame,
                jobs: segment.jobs.len(),
            });
        }
    }

    let mut jobs: Vec<Job> = if listed.is_empty() {
        task.segments
            .iter()
            .flat_map(|segment| {
                segment.jobs.iter().map(move |job| Job {
                    id: job.id,
                    task_id: task.id,
                    status: job.status.clone().unwrap_or_default(),
                    stage: None,
                    state: None,
                    start_frame: segment.start_frame,
                    stop_frame: segment.stop_frame,
                })
            })
            .collect()
    } else {
        listed
            .iter()
            .filter(|job| job.task_id == task.id)
            .cloned()
            .collect()
    };
    jobs.sort_by_key(|job| (job.start_frame, job.id));
    Ok(jobs)
}

/// Build the frame table of `task`.
///
/// Frame indices `meta.start_frame..=meta.stop_frame` are paired positionally
/// with `meta.frames`. Every index a job claims must exist in the table, no
/// index may be claimed twice, and every frame must end up claimed by some job.
pub fn reconcile_frames(
    task: &Task,
    meta: &TaskMeta,
    jobs: &[Job],
) -> Result<FrameTable, CvatError> {
    let declared = meta
        .stop_frame
        .checked_sub(meta.start_frame)
        .map_or(0, |span| span as usize + 1);
    if declared != meta.frames.len() {
        log::warn!(
            "Task {}: metadata declares frames {}..={} but describes {} frame(s)",
            task.id,
            meta.start_frame,
            meta.stop_frame,
            meta.frames.len()
        );
    }

    let mut slots: BTreeMap<u32, (&str, u32, u32, Option<&Job>)> = (meta.start_frame
        ..=meta.stop_frame)
        .zip(&meta.frames)
        .map(|(index, frame)| (index, (frame.name.as_str(), frame.width, frame.height, None)))
        .collect();

    for job in jobs {
        for index in job.start_frame..=job.stop_frame {
            let slot = slots.get_mut(&index).ok_or(CvatError::JobFrameMissing {
                task_id: task.id,
                job_id: job.id,
                frame: index,
            })?;
            if let Some(owner) = slot.3 {
                return Err(CvatError::OverlappingJobs {
                    task_id: task.id,
                    frame: index,
                    first: owner.id,
                    second: job.id,
                });
            }
            slot.3 = Some(job);
        }
    }

    let mut frames = BTreeMap::new();
    for (index, (name, width, height, job)) in slots {
        let job = job.ok_or(CvatError::FrameWithoutJob {
            task_id: task.id,
            frame: index,
        })?;
        frames.insert(
            index,
            Frame {
                id: image_id_from_name(name),
                frame: index,
                file_name: file_name_of(name).to_string(),
                width,
                height,
                task_id: task.id,
                task_name: task.name.clone(),
                job_id: job.id,
                status: job.status.clone(),
                file_path: None,
            },
        );
    }

    Ok(FrameTable { frames })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{FrameMeta, Segment, SegmentJob};

    fn task(segments: Vec<Segment>) -> Task {
        Task {
            id: TaskId::new(7),
            name: "street".into(),
            status: None,
            project_id: None,
            segments,
        }
    }

    fn meta(count: u32) -> TaskMeta {
        TaskMeta {
            start_frame: 0,
            stop_frame: count - 1,
            size: Some(count),
            frames: (0..count)
                .map(|i| FrameMeta {
                    width: 640,
                    height: 480,
                    name: format!("batch/img_{i:03}.jpg"),
                })
                .collect(),
        }
    }

    fn job(id: u64, start: u32, stop: u32, status: &str) -> Job {
        Job {
            id: JobId::new(id),
            task_id: TaskId::new(7),
            status: status.into(),
            stage: None,
            state: None,
            start_frame: start,
            stop_frame: stop,
        }
    }

    #[test]
    fn partition_assigns_every_frame() {
        let jobs = [job(1, 0, 1, "completed"), job(2, 2, 4, "annotation")];
        let table = reconcile_frames(&task(vec![]), &meta(5), &jobs).unwrap();

        assert_eq!(table.len(), 5);
        let third = table.get(2).unwrap();
        assert_eq!(third.id, "batch/img_002");
        assert_eq!(third.file_name, "img_002.jpg");
        assert_eq!(third.job_id, JobId::new(2));
        assert_eq!(third.status, "annotation");
        assert_eq!(table.get(0).unwrap().job_id, JobId::new(1));
    }

    #[test]
    fn gap_in_job_coverage_is_fatal() {
        let jobs = [job(1, 0, 1, "completed"), job(2, 3, 4, "completed")];
        let err = reconcile_frames(&task(vec![]), &meta(5), &jobs).unwrap_err();
        assert!(matches!(err, CvatError::FrameWithoutJob { frame: 2, .. }));
    }

    #[test]
    fn overlapping_jobs_are_fatal() {
        let jobs = [job(1, 0, 2, "completed"), job(2, 2, 4, "completed")];
        let err = reconcile_frames(&task(vec![]), &meta(5), &jobs).unwrap_err();
        match err {
            CvatError::OverlappingJobs {
                frame,
                first,
                second,
                ..
            } => {
                assert_eq!(frame, 2);
                assert_eq!(first, JobId::new(1));
                assert_eq!(second, JobId::new(2));
            }
            other => panic!("expected OverlappingJobs, got {other:?}"),
        }
    }

    #[test]
    fn job_beyond_metadata_is_fatal() {
        let jobs = [job(1, 0, 5, "completed")];
        let err = reconcile_frames(&task(vec![]), &meta(5), &jobs).unwrap_err();
        match err {
            CvatError::JobFrameMissing { job_id, frame, .. } => {
                assert_eq!(job_id, JobId::new(1));
                assert_eq!(frame, 5);
            }
            other => panic!("expected JobFrameMissing, got {other:?}"),
        }
    }

    #[test]
    fn retain_completed_drops_unfinished_work() {
        let jobs = [job(1, 0, 1, "completed"), job(2, 2, 4, "validation")];
        let mut table = reconcile_frames(&task(vec![]), &meta(5), &jobs).unwrap();
        table.retain_completed();
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(Frame::is_completed));
    }

    #[test]
    fn segment_with_two_jobs_is_fatal() {
        let t = task(vec![Segment {
            start_frame: 0,
            stop_frame: 4,
            jobs: vec![
                SegmentJob {
                    id: JobId::new(1),
                    status: None,
                },
                SegmentJob {
                    id: JobId::new(2),
                    status: None,
                },
            ],
        }]);
        let err = jobs_for_task(&t, &[]).unwrap_err();
        assert!(matches!(err, CvatError::SegmentJobCount { jobs: 2, .. }));
    }

    #[test]
    fn segments_stand_in_for_missing_job_listing() {
        let t = task(vec![
            Segment {
                start_frame: 3,
                stop_frame: 4,
                jobs: vec![SegmentJob {
                    id: JobId::new(9),
                    status: Some("completed".into()),
                }],
            },
            Segment {
                start_frame: 0,
                stop_frame: 2,
                jobs: vec![SegmentJob {
                    id: JobId::new(8),
                    status: None,
                }],
            },
        ]);
        let jobs = jobs_for_task(&t, &[]).unwrap();
        let ids: Vec<u64> = jobs.iter().map(|j| j.id.as_u64()).collect();
        assert_eq!(ids, vec![8, 9]);
        assert!(jobs[1].is_completed());
    }

    #[test]
    fn listed_jobs_of_other_tasks_are_ignored() {
        let mut foreign = job(5, 0, 4, "completed");
        foreign.task_id = TaskId::new(99);
        let jobs = jobs_for_task(&task(vec![]), &[foreign, job(1, 0, 4, "new")]).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, JobId::new(1));
    }

    #[test]
    fn image_id_strips_only_the_extension() {
        assert_eq!(image_id_from_name("img_01.jpg"), "img_01");
        assert_eq!(image_id_from_name("a/b/scan.v2.png"), "a/b/scan.v2");
        assert_eq!(image_id_from_name("noext"), "noext");
        assert_eq!(image_id_from_name(".hidden"), ".hidden");
    }

    #[test]
    fn short_metadata_truncates_the_table() {
        let mut m = meta(5);
        m.frames.truncate(3);
        let err = reconcile_frames(&task(vec![]), &m, &[job(1, 0, 4, "completed")]).unwrap_err();
        assert!(matches!(err, CvatError::JobFrameMissing { frame: 3, .. }));
    }
}
