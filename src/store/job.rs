use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::translate::TranslationOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// The oracle kept failing until the retry policy gave up
    OracleUnavailable,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::OracleUnavailable => "oracle_unavailable",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end-to-end translation run over a document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub session_id: String,
    pub status: JobStatus,
    /// Fraction done, 0.0 to 1.0
    pub progress: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub options: TranslationOptions,
    #[serde(skip)]
    cancel: CancellationToken,
}

impl Job {
    pub(crate) fn new(id: String, session_id: String, options: TranslationOptions) -> Self {
        Self {
            id,
            session_id,
            status: JobStatus::Pending,
            progress: 0.0,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            result: None,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token the job's pipeline watches; cancelled when the job is superseded or cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Progress as a whole percentage
    pub fn percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    pub(crate) fn set_progress(&mut self, value: f64) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::InProgress;
        }
        let clamped = value.clamp(0.0, 1.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }

    pub(crate) fn complete(&mut self, result: String) {
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
    }

    /// Move to a terminal, non-successful status
    pub(crate) fn finish_unsuccessfully(&mut self, status: JobStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
        self.cancel.cancel();
    }
}
