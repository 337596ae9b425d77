// Session and job registry
//
// - session: sessions, loaded files and list summaries
// - job: translation jobs and their state machine
//
// A `Store` is an explicitly owned handle; clones share the same registry.

pub mod job;
pub mod session;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub use job::*;
pub use session::*;
use crate::error::{Result, SubflowError};
use crate::translate::TranslationOptions;

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<String, Session>,
    jobs: HashMap<String, Job>,
}

impl Registry {
    /// Remove a job and stop its pipeline
    fn drop_job(&mut self, job_id: &str) -> bool {
        match self.jobs.remove(job_id) {
            Some(job) => {
                job.cancellation_token().cancel();
                if let Some(session) = self.sessions.get_mut(&job.session_id) {
                    if session.job_id.as_deref() == Some(job_id) {
                        session.job_id = None;
                    }
                }
                true
            }
            None => false,
        }
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut Session> {
        self.sessions.get_mut(session_id).ok_or(SubflowError::SessionNotFound)
    }

    /// Apply `f` to a live job; ignored once the job is terminal or gone
    fn with_live_job(&mut self, job_id: &str, f: impl FnOnce(&mut Job)) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(job) if job.status.is_live() => {
                f(job);
                true
            }
            _ => false,
        }
    }
}

/// What a retention sweep removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub jobs_removed: usize,
    pub sessions_removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<Registry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.write().sessions.insert(id.clone(), Session::new(id.clone()));
        info!("Created session {}", id);
        id
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.read().sessions.get(session_id).cloned()
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        let registry = self.read();
        let mut summaries: Vec<_> = registry
            .sessions
            .values()
            .map(|s| {
                let job = s.job_id.as_ref().and_then(|id| registry.jobs.get(id));
                SessionSummary {
                    id: s.id.clone(),
                    has_file: s.loaded_file.is_some(),
                    file_type: s.loaded_file.as_ref().map(|f| f.kind),
                    has_job: job.is_some(),
                    job_status: job.map(|j| j.status),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Remove a session together with its job
    pub fn delete_session(&self, session_id: &str) -> bool {
        let mut registry = self.write();
        let Some(session) = registry.sessions.remove(session_id) else {
            return false;
        };
        if let Some(job_id) = session.job_id {
            registry.drop_job(&job_id);
        }
        info!("Deleted session {}", session_id);
        true
    }

    /// Replace the session's file; any previous job is dropped
    pub fn load_file(&self, session_id: &str, file: LoadedFile) -> Result<()> {
        let mut registry = self.write();
        let previous_job = registry.session_mut(session_id)?.job_id.take();
        if let Some(job_id) = previous_job {
            registry.drop_job(&job_id);
        }

        let session = registry.session_mut(session_id)?;
        info!("Session {} loaded {} file {}", session_id, file.kind.as_str(), file.path.display());
        session.loaded_file = Some(file);
        session.touch();
        Ok(())
    }

    pub fn set_extracted_subtitle(&self, session_id: &str, text: String) -> Result<()> {
        let mut registry = self.write();
        let session = registry.session_mut(session_id)?;
        match session.loaded_file.as_mut() {
            Some(file) if file.kind == FileKind::Video => {
                file.extracted_subtitle = Some(text);
                session.touch();
                Ok(())
            }
            _ => Err(SubflowError::InvalidState("No video file loaded in session".to_string())),
        }
    }

    /// Drop the session's file and job, keeping the session itself
    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        let mut registry = self.write();
        let session = registry.session_mut(session_id)?;
        session.loaded_file = None;
        session.touch();
        if let Some(job_id) = session.job_id.take() {
            registry.drop_job(&job_id);
        }
        Ok(())
    }

    /// Create a pending job for the session, superseding its previous job.
    ///
    /// A session holds at most one live job: the previous one is cancelled and stays
    /// queryable by id until swept.
    pub fn start_job(&self, session_id: &str, options: TranslationOptions) -> Result<Job> {
        let mut registry = self.write();
        let previous = registry.session_mut(session_id)?.job_id.clone();

        if let Some(previous) = previous {
            let superseded = registry.with_live_job(&previous, |job| {
                job.finish_unsuccessfully(JobStatus::Cancelled, None);
            });
            if superseded {
                info!("Job {} superseded by a new job on session {}", previous, session_id);
            }
        }

        let job = Job::new(Uuid::new_v4().to_string(), session_id.to_string(), options);
        registry.jobs.insert(job.id.clone(), job.clone());

        let session = registry.session_mut(session_id)?;
        session.job_id = Some(job.id.clone());
        session.touch();

        info!("Started job {} on session {}", job.id, session_id);
        Ok(job)
    }

    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.read().jobs.get(job_id).cloned()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.read().jobs.values().cloned().collect()
    }

    pub fn update_progress(&self, job_id: &str, value: f64) -> bool {
        self.write().with_live_job(job_id, |job| job.set_progress(value))
    }

    pub fn complete_job(&self, job_id: &str, result: String) -> bool {
        let applied = self.write().with_live_job(job_id, |job| job.complete(result));
        if applied {
            info!("Job {} completed", job_id);
        }
        applied
    }

    pub fn fail_job(&self, job_id: &str, error: String) -> bool {
        let applied = self.write().with_live_job(job_id, |job| {
            job.finish_unsuccessfully(JobStatus::Failed, Some(error));
        });
        if applied {
            info!("Job {} failed", job_id);
        }
        applied
    }

    pub fn mark_oracle_unavailable(&self, job_id: &str, error: String) -> bool {
        let applied = self.write().with_live_job(job_id, |job| {
            job.finish_unsuccessfully(JobStatus::OracleUnavailable, Some(error));
        });
        if applied {
            info!("Job {} stopped: oracle unavailable", job_id);
        }
        applied
    }

    /// Cancel a live job and signal its pipeline
    pub fn cancel_job(&self, job_id: &str) -> bool {
        let applied = self.write().with_live_job(job_id, |job| {
            job.finish_unsuccessfully(JobStatus::Cancelled, None);
        });
        if applied {
            info!("Job {} cancelled", job_id);
        }
        applied
    }

    /// Remove a job, cancelling its pipeline and detaching it from its session
    pub fn delete_job(&self, job_id: &str) -> bool {
        self.write().drop_job(job_id)
    }

    /// Delete jobs finished before `now - retention` and sessions idle since then
    pub fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> SweepReport {
        let Some(cutoff) = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|r| now.checked_sub_signed(r))
        else {
            return SweepReport::default();
        };

        let mut registry = self.write();
        let mut report = SweepReport::default();

        let stale_jobs: Vec<String> = registry
            .jobs
            .values()
            .filter(|job| job.completed_at.is_some_and(|at| at < cutoff))
            .map(|job| job.id.clone())
            .collect();
        for job_id in stale_jobs {
            if registry.drop_job(&job_id) {
                report.jobs_removed += 1;
            }
        }

        let Registry { sessions, jobs } = &mut *registry;
        let before = sessions.len();
        sessions.retain(|_, session| {
            let has_job = session.job_id.as_ref().is_some_and(|id| jobs.contains_key(id));
            has_job || session.updated_at >= cutoff
        });
        report.sessions_removed = before - sessions.len();

        debug!(
            "Sweep removed {} jobs and {} sessions",
            report.jobs_removed, report.sessions_removed
        );
        report
    }
}

/// Run [`Store::sweep`] every `interval` until the task is aborted
pub fn spawn_sweeper(store: Store, interval: Duration, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let report = store.sweep(Utc::now(), retention);
            if report != SweepReport::default() {
                info!(
                    "Retention sweep removed {} jobs and {} sessions",
                    report.jobs_removed, report.sessions_removed
                );
            }
        }
    })
}
