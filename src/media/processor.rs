use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SubflowError};
use super::{FfmpegCommands, MediaToolkit, SubtitleTrack, VideoInfo};

static STREAM_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Stream #\d+:(\d+)(?:\[[^\]]*\])?(?:\((\w+)\))?: (\w+): ([^\s,]+)(?: \(([^)]+)\))?")
        .expect("stream pattern is valid")
});

static TITLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+title\s+:\s+(.+)$").expect("title pattern is valid")
});

/// Subtitle streams listed in `ffmpeg -i` diagnostics
pub fn parse_subtitle_streams(output: &str) -> Vec<SubtitleTrack> {
    let mut tracks = Vec::new();
    // title lines belong to the most recent stream, which may not be a subtitle
    let mut current: Option<usize> = None;

    for line in output.lines() {
        if let Some(caps) = STREAM_LINE.captures(line) {
            current = None;
            if &caps[3] != "Subtitle" {
                continue;
            }
            let Ok(index) = caps[1].parse() else {
                continue;
            };
            let codec = caps[4].to_string();
            tracks.push(SubtitleTrack {
                index,
                language: caps.get(2).map(|m| m.as_str().to_string()),
                title: None,
                format: caps.get(5).map_or(codec, |m| m.as_str().to_string()),
            });
            current = Some(tracks.len() - 1);
            continue;
        }

        if let (Some(idx), Some(caps)) = (current, TITLE_LINE.captures(line)) {
            tracks[idx].title = Some(caps[1].trim().to_string());
        }
    }

    tracks
}

/// Whether a track can be extracted as SubRip text
pub fn is_subrip(track: &SubtitleTrack) -> bool {
    let format = track.format.to_lowercase();
    format.contains("srt") || format.contains("subrip")
}

/// Concrete media toolkit (FFmpeg-based)
pub struct FfmpegToolkit {
    config: MediaConfig,
    commands: FfmpegCommands,
}

impl FfmpegToolkit {
    pub fn new(config: MediaConfig) -> Self {
        let commands = FfmpegCommands::new(config.binary_path.as_str());
        Self { config, commands }
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn locate(&self) -> Result<String> {
        let output = self.commands.version().run_checked().await?;
        let version = output.stdout.lines().next().unwrap_or("Unknown version");
        info!("Media processor is available: {}", version);
        Ok(self.config.binary_path.clone())
    }

    async fn probe(&self, video_path: &Path) -> Result<VideoInfo> {
        if !video_path.exists() {
            return Err(SubflowError::FileNotFound(video_path.display().to_string()));
        }

        let output = self.commands.probe(video_path).run().await?;
        let subtitle_tracks = parse_subtitle_streams(&output.stderr);
        debug!("Found {} subtitle tracks in {}", subtitle_tracks.len(), video_path.display());

        Ok(VideoInfo {
            path: video_path.to_path_buf(),
            subtitle_tracks,
        })
    }

    async fn extract_subtitle(&self, video_path: &Path, stream_index: u32) -> Result<String> {
        if !video_path.exists() {
            return Err(SubflowError::FileNotFound(video_path.display().to_string()));
        }

        let work_dir = tempfile::Builder::new().prefix("subflow-extract").tempdir()?;
        let output_path = work_dir.path().join("subtitle.srt");

        info!("Extracting subtitle stream {} from {}", stream_index, video_path.display());
        self.commands
            .extract_subtitle(video_path, stream_index, &output_path)
            .run_checked()
            .await?;

        let text = tokio::fs::read_to_string(&output_path).await.map_err(|e| {
            SubflowError::Media(format!("Failed to read extracted subtitle: {}", e))
        })?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_OUTPUT: &str = "\
Input #0, matroska,webm, from 'movie.mkv':
  Metadata:
    title           : Container Title
  Duration: 01:42:10.05, start: 0.000000, bitrate: 4120 kb/s
  Stream #0:0(eng): Video: h264 (High), yuv420p(progressive), 1920x1080
  Stream #0:1(jpn): Audio: aac (LC), 48000 Hz, stereo, fltp (default)
    Metadata:
      title           : Japanese Audio
  Stream #0:2(eng): Subtitle: subrip (srt) (default)
    Metadata:
      title           : English Full
  Stream #0:3[0x1f](fre): Subtitle: ass
  Stream #0:4: Subtitle: subrip
  Stream #0:5(ger): Video: mjpeg, yuvj420p
    Metadata:
      title           : Cover
At least one output file must be specified
";

    #[test]
    fn test_parse_subtitle_streams() {
        let tracks = parse_subtitle_streams(PROBE_OUTPUT);

        assert_eq!(tracks.len(), 3);
        assert_eq!(
            tracks[0],
            SubtitleTrack {
                index: 2,
                language: Some("eng".to_string()),
                title: Some("English Full".to_string()),
                format: "srt".to_string(),
            }
        );
        assert_eq!(tracks[1].index, 3);
        assert_eq!(tracks[1].language.as_deref(), Some("fre"));
        assert_eq!(tracks[1].format, "ass");
        assert_eq!(tracks[2].index, 4);
        assert_eq!(tracks[2].language, None);
        // the cover stream's title must not leak onto the last subtitle
        assert_eq!(tracks[2].title, None);
    }

    #[test]
    fn test_is_subrip() {
        let tracks = parse_subtitle_streams(PROBE_OUTPUT);
        let subrip: Vec<_> = tracks.iter().filter(|t| is_subrip(t)).map(|t| t.index).collect();
        assert_eq!(subrip, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let toolkit = FfmpegToolkit::new(MediaConfig::default());
        let err = toolkit.probe(Path::new("/definitely/not/here.mkv")).await.unwrap_err();
        assert!(matches!(err, SubflowError::FileNotFound(_)));
    }
}
