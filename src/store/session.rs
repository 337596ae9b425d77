use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::VideoInfo;
use super::job::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Video,
    Subtitle,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Subtitle => "subtitle",
        }
    }
}

/// A file bound to a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedFile {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Text of a subtitle file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_info: Option<VideoInfo>,
    /// Subtitle track pulled out of a video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_subtitle: Option<String>,
}

impl LoadedFile {
    pub fn subtitle(path: PathBuf, content: String) -> Self {
        Self {
            path,
            kind: FileKind::Subtitle,
            content: Some(content),
            video_info: None,
            extracted_subtitle: None,
        }
    }

    pub fn video(path: PathBuf, video_info: VideoInfo) -> Self {
        Self {
            path,
            kind: FileKind::Video,
            content: None,
            video_info: Some(video_info),
            extracted_subtitle: None,
        }
    }

    /// Text a translation job would run on, if any is available yet
    pub fn subtitle_text(&self) -> Option<&str> {
        match self.kind {
            FileKind::Subtitle => self.content.as_deref(),
            FileKind::Video => self.extracted_subtitle.as_deref(),
        }
        .filter(|text| !text.is_empty())
    }
}

/// A stateful handle binding a loaded file to at most one job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Last time a file or job was attached
    pub updated_at: DateTime<Utc>,
    pub loaded_file: Option<LoadedFile>,
    pub job_id: Option<String>,
}

impl Session {
    pub(crate) fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            loaded_file: None,
            job_id: None,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Row of `sessions.list`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub has_file: bool,
    pub file_type: Option<FileKind>,
    pub has_job: bool,
    pub job_status: Option<JobStatus>,
}
