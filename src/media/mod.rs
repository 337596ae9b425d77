// Media tooling collaborator
//
// - commands: ffmpeg command builder and execution
// - processor: ffmpeg-backed toolkit (probe video, extract subtitle tracks)

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// A subtitle stream inside a video container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    /// Stream index within the container
    pub index: u32,
    pub language: Option<String>,
    pub title: Option<String>,
    /// Codec or format name as reported by ffmpeg
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub path: PathBuf,
    pub subtitle_tracks: Vec<SubtitleTrack>,
}

/// Operations on video files delegated to an external media binary
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Verify the media binary can run and return its path
    async fn locate(&self) -> Result<String>;

    /// List the subtitle tracks of a video
    async fn probe(&self, video_path: &Path) -> Result<VideoInfo>;

    /// Extract one subtitle stream as SubRip text
    async fn extract_subtitle(&self, video_path: &Path, stream_index: u32) -> Result<String>;
}

/// Factory for creating media toolkit instances
pub struct MediaToolkitFactory;

impl MediaToolkitFactory {
    /// Create the default toolkit implementation (FFmpeg-based)
    pub fn create_default(config: MediaConfig) -> Arc<dyn MediaToolkit> {
        Arc::new(processor::FfmpegToolkit::new(config))
    }
}
