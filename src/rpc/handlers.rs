use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, SubflowError};
use crate::media::{is_subrip, SubtitleTrack, VideoInfo};
use crate::store::{FileKind, JobStatus, LoadedFile, Session};
use crate::translate::TranslationOptions;
use super::{Params, RpcContext, METHODS};

/// Extensions loaded as subtitle text; anything else is probed as a video
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "sub"];

fn is_subtitle_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
}

fn session(context: &RpcContext, session_id: &str) -> Result<Session> {
    context.store.session(session_id).ok_or(SubflowError::SessionNotFound)
}

/// Video info of a session that has a video loaded
fn loaded_video(session: &Session) -> Result<(&Path, &VideoInfo)> {
    session
        .loaded_file
        .as_ref()
        .filter(|file| file.kind == FileKind::Video)
        .map(|file| (file.path.as_path(), file.video_info.as_ref()))
        .and_then(|(path, info)| info.map(|info| (path, info)))
        .ok_or_else(|| SubflowError::InvalidState("No video file loaded in session".to_string()))
}

/// Tracks that can be extracted as text; a client's subtitle id is a position in this list
fn extractable_tracks(info: &VideoInfo) -> Vec<&SubtitleTrack> {
    info.subtitle_tracks.iter().filter(|track| is_subrip(track)).collect()
}

fn track_entries(info: &VideoInfo, codec_key: &str) -> Vec<Value> {
    extractable_tracks(info)
        .into_iter()
        .enumerate()
        .map(|(id, track)| {
            let mut entry = serde_json::Map::new();
            entry.insert("id".into(), json!(id));
            entry.insert("language".into(), json!(track.language.as_deref().unwrap_or("Unknown")));
            entry.insert(codec_key.into(), json!(track.format));
            entry.insert(
                "title".into(),
                json!(track.title.clone().unwrap_or_else(|| format!("Subtitle {}", id + 1))),
            );
            Value::Object(entry)
        })
        .collect()
}

/// Accepts a JSON number or a numeric string
fn subtitle_id(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub async fn init(context: &RpcContext) -> Result<Value> {
    let path = context.media.locate().await?;
    Ok(json!({ "success": true, "ffmpegPath": path }))
}

pub fn session_create(context: &RpcContext) -> Result<Value> {
    let session_id = context.store.create_session();
    Ok(json!({ "sessionId": session_id }))
}

pub fn session_get(context: &RpcContext, params: &Params) -> Result<Value> {
    let [session_id] = params.require_strs(["sessionId"])?;
    let session = session(context, session_id)?;
    Ok(serde_json::to_value(session)?)
}

pub fn session_delete(context: &RpcContext, params: &Params) -> Result<Value> {
    let [session_id] = params.require_strs(["sessionId"])?;
    Ok(json!({ "success": context.store.delete_session(session_id) }))
}

pub fn session_clear(context: &RpcContext, params: &Params) -> Result<Value> {
    let [session_id] = params.require_strs(["sessionId"])?;
    context.store.clear_session(session_id)?;
    Ok(json!({ "success": true }))
}

pub async fn file_load(context: &RpcContext, params: &Params) -> Result<Value> {
    let [session_id, file_path] = params.require_strs(["sessionId", "filePath"])?;
    session(context, session_id)?;

    let path = PathBuf::from(file_path);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(SubflowError::FileNotFound(file_path.to_string()));
    }

    if is_subtitle_path(&path) {
        let content = tokio::fs::read_to_string(&path).await?;
        let content_length = content.chars().count();
        context.store.load_file(session_id, LoadedFile::subtitle(path, content))?;
        return Ok(json!({
            "type": FileKind::Subtitle,
            "path": file_path,
            "contentLength": content_length,
        }));
    }

    let video_info = context.media.probe(&path).await?;
    let response = json!({
        "type": FileKind::Video,
        "path": file_path,
        "videoInfo": video_info,
    });
    context.store.load_file(session_id, LoadedFile::video(path, video_info))?;
    Ok(response)
}

pub fn file_info(context: &RpcContext, params: &Params) -> Result<Value> {
    let [session_id] = params.require_strs(["sessionId"])?;
    let session = session(context, session_id)?;
    let file = session
        .loaded_file
        .as_ref()
        .ok_or_else(|| SubflowError::InvalidState("No file loaded".to_string()))?;

    let mut response = json!({ "path": file.path, "type": file.kind });
    match file.kind {
        FileKind::Subtitle => {
            let length = file.content.as_deref().map_or(0, |c| c.chars().count());
            response["contentLength"] = json!(length);
            response["hasContent"] = json!(length > 0);
        }
        FileKind::Video => {
            let tracks = file
                .video_info
                .as_ref()
                .map(|info| track_entries(info, "format"))
                .unwrap_or_default();
            response["subtitles"] = Value::Array(tracks);
            response["hasExtractedSubtitle"] = json!(file.extracted_subtitle.is_some());
        }
    }
    Ok(response)
}

pub fn subtitles_list(context: &RpcContext, params: &Params) -> Result<Value> {
    let [session_id] = params.require_strs(["sessionId"])?;
    let session = session(context, session_id)?;
    let (_, info) = loaded_video(&session)?;
    Ok(json!({ "subtitles": track_entries(info, "codec") }))
}

pub async fn subtitle_extract(context: &RpcContext, params: &Params) -> Result<Value> {
    let session_id = params.str(0);
    let raw_id = params.value(1);
    let (Some(session_id), Some(raw_id)) = (session_id, raw_id) else {
        return Err(SubflowError::InvalidParams("sessionId and subtitleId required".to_string()));
    };
    let id = subtitle_id(raw_id)
        .ok_or_else(|| SubflowError::InvalidParams("subtitleId must be a non-negative integer".to_string()))?;

    let session = session(context, session_id)?;
    let (path, info) = loaded_video(&session)?;
    let track = extractable_tracks(info)
        .get(id)
        .copied()
        .ok_or_else(|| SubflowError::InvalidParams(format!("subtitleId {} is out of range", id)))?;

    let text = context.media.extract_subtitle(path, track.index).await?;
    let content_length = text.chars().count();
    context.store.set_extracted_subtitle(session_id, text)?;

    Ok(json!({ "success": true, "contentLength": content_length }))
}

/// `translation.start` options as sent by clients
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartOptions {
    api_key: Option<String>,
    language: Option<String>,
    context: Option<String>,
    model: Option<String>,
    batch_size: Option<usize>,
}

impl StartOptions {
    fn into_options(self, context: &RpcContext) -> Result<TranslationOptions> {
        let api_key = self.api_key.filter(|s| !s.is_empty());
        let language = self.language.filter(|s| !s.is_empty());
        let (Some(api_key), Some(language)) = (api_key, language) else {
            return Err(SubflowError::InvalidParams(
                "apiKey and language required in options".to_string(),
            ));
        };

        let batch_size = self.batch_size.unwrap_or(context.defaults.batch_size);
        if batch_size == 0 {
            return Err(SubflowError::InvalidParams("batchSize must be at least 1".to_string()));
        }

        Ok(TranslationOptions::new(api_key, language)
            .with_context(self.context.unwrap_or_default())
            .with_model(
                self.model
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| context.defaults.model.clone()),
            )
            .with_batch_size(batch_size))
    }
}

pub fn translation_start(context: &RpcContext, params: &Params) -> Result<Value> {
    let (Some(session_id), Some(raw_options)) = (params.str(0), params.value(1)) else {
        return Err(SubflowError::InvalidParams("sessionId and options required".to_string()));
    };
    let options = StartOptions::deserialize(raw_options)
        .map_err(|e| SubflowError::InvalidParams(format!("options: {}", e)))?
        .into_options(context)?;

    let session = session(context, session_id)?;
    let text = session
        .loaded_file
        .as_ref()
        .and_then(|file| file.subtitle_text())
        .ok_or_else(|| {
            SubflowError::InvalidState(
                "No subtitle content to translate. Load a subtitle file or extract from video first."
                    .to_string(),
            )
        })?
        .to_string();

    let job = context.store.start_job(session_id, options)?;
    let job_id = job.id.clone();
    context.pipeline.spawn(context.store.clone(), job, text);

    Ok(json!({ "jobId": job_id, "status": "started" }))
}

pub fn translation_status(context: &RpcContext, params: &Params) -> Result<Value> {
    let [job_id] = params.require_strs(["jobId"])?;
    let job = context.store.job(job_id).ok_or(SubflowError::JobNotFound)?;

    Ok(json!({
        "id": job.id,
        "status": job.status,
        "progress": job.percent(),
        "startedAt": job.started_at,
        "completedAt": job.completed_at,
        "error": job.error,
    }))
}

pub fn translation_result(context: &RpcContext, params: &Params) -> Result<Value> {
    let [job_id] = params.require_strs(["jobId"])?;
    let job = context.store.job(job_id).ok_or(SubflowError::JobNotFound)?;

    match (job.status, job.result) {
        (JobStatus::Completed, Some(result)) => Ok(json!({
            "translatedText": result,
            "completedAt": job.completed_at,
        })),
        (status, _) => Err(SubflowError::InvalidState(format!(
            "Job not completed. Current status: {}",
            status
        ))),
    }
}

pub fn translation_cancel(context: &RpcContext, params: &Params) -> Result<Value> {
    let [job_id] = params.require_strs(["jobId"])?;
    if context.store.job(job_id).is_none() {
        return Err(SubflowError::JobNotFound);
    }
    Ok(json!({ "success": context.store.cancel_job(job_id) }))
}

pub async fn translation_save(context: &RpcContext, params: &Params) -> Result<Value> {
    let [job_id, file_path] = params.require_strs(["jobId", "filePath"])?;
    let job = context.store.job(job_id).ok_or(SubflowError::JobNotFound)?;

    let result = match (job.status, job.result) {
        (JobStatus::Completed, Some(result)) => result,
        _ => return Err(SubflowError::InvalidState("Translation not completed".to_string())),
    };

    tokio::fs::write(file_path, &result).await?;
    info!("Saved translation of job {} to {}", job_id, file_path);

    Ok(json!({
        "success": true,
        "path": file_path,
        "size": result.chars().count(),
    }))
}

pub fn sessions_list(context: &RpcContext) -> Result<Value> {
    Ok(json!({ "sessions": context.store.sessions() }))
}

pub fn info() -> Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "api": "session-based",
        "endpoints": METHODS,
    })
}
