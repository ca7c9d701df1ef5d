// SPDX-License-Identifier: GPL-3.0-or-later

//! Playlist generation job tracking.

use crate::matching::{MatchProgress, TrackMatch};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use tunesmith_domain::{JobId, JobStatus, JobTimestamps};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {job_id} has no track at index {index}")]
    TrackIndexOutOfRange { job_id: JobId, index: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistJob {
    pub id: JobId,
    pub prompt: String,
    pub status: JobStatus,
    pub tracks: Vec<TrackMatch>,
    pub error: Option<String>,
    pub timestamps: JobTimestamps,
}

impl PlaylistJob {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            prompt: prompt.into(),
            status: JobStatus::Pending,
            tracks: Vec::new(),
            error: None,
            timestamps: JobTimestamps::now(),
        }
    }

    fn apply(&mut self, update: &JobUpdate) -> Result<(), JobStoreError> {
        match update {
            JobUpdate::Status(status) => self.status = *status,
            JobUpdate::Tracks(tracks) => self.tracks = tracks.clone(),
            JobUpdate::Track { index, track } => {
                let slot = self
                    .tracks
                    .get_mut(*index)
                    .ok_or(JobStoreError::TrackIndexOutOfRange {
                        job_id: self.id,
                        index: *index,
                    })?;
                *slot = track.clone();
            }
            JobUpdate::Failed(message) => {
                self.status = JobStatus::Failed;
                self.error = Some(message.clone());
            }
        }
        self.timestamps.touch();
        Ok(())
    }
}

/// A change to a job, as applied by [`JobStore::update`] and broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JobUpdate {
    Status(JobStatus),
    Tracks(Vec<TrackMatch>),
    Track { index: usize, track: TrackMatch },
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub update: JobUpdate,
}

/// Storage for in-flight and finished playlist jobs.
pub trait JobStore: Send + Sync {
    fn create(&self, prompt: &str) -> PlaylistJob;

    fn get(&self, id: JobId) -> Option<PlaylistJob>;

    fn update(&self, id: JobId, update: JobUpdate) -> Result<PlaylistJob, JobStoreError>;

    /// Receive every update applied from now on, for all jobs.
    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;
}

/// Process-local job store.
#[derive(Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<Mutex<HashMap<JobId, PlaylistJob>>>,
    events: broadcast::Sender<JobEvent>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("Failed to acquire lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, prompt: &str) -> PlaylistJob {
        let job = PlaylistJob::new(prompt);
        self.jobs
            .lock()
            .expect("Failed to acquire lock")
            .insert(job.id, job.clone());
        debug!(target: "jobs", job_id = %job.id, "job created");
        job
    }

    fn get(&self, id: JobId) -> Option<PlaylistJob> {
        self.jobs
            .lock()
            .expect("Failed to acquire lock")
            .get(&id)
            .cloned()
    }

    fn update(&self, id: JobId, update: JobUpdate) -> Result<PlaylistJob, JobStoreError> {
        let snapshot = {
            let mut jobs = self.jobs.lock().expect("Failed to acquire lock");
            let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
            job.apply(&update)?;
            job.clone()
        };

        // No subscribers is not an error.
        let _ = self.events.send(JobEvent { job_id: id, update });
        Ok(snapshot)
    }

    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }
}

/// Progress sink that records each track update on a stored job.
pub struct JobProgress<'a, S: ?Sized> {
    store: &'a S,
    job_id: JobId,
}

impl<'a, S: JobStore + ?Sized> JobProgress<'a, S> {
    pub fn new(store: &'a S, job_id: JobId) -> Self {
        Self { store, job_id }
    }
}

impl<S: JobStore + ?Sized> MatchProgress for JobProgress<'_, S> {
    fn report(&self, index: usize, track: &TrackMatch) {
        let update = JobUpdate::Track {
            index,
            track: track.clone(),
        };
        if let Err(error) = self.store.update(self.job_id, update) {
            warn!(target: "jobs", job_id = %self.job_id, %error, "dropping progress update");
        }
    }
}
