// Shared fixtures for integration tests
//
// Stub oracle and media toolkit plus helpers for driving the RPC dispatcher.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use subflow::error::{Result, SubflowError};
use subflow::media::{MediaToolkit, SubtitleTrack, VideoInfo};
use subflow::pipeline::TranslationPipeline;
use subflow::rpc::{dispatch, JobDefaults, RpcContext, RpcRequest, RpcResponse};
use subflow::store::Store;
use subflow::translate::{Oracle, OracleRequest, RetryPolicy};

pub const SAMPLE_SRT: &str = "\
1
00:00:01,000 --> 00:00:02,500
Where are we going?

2
00:00:03,000 --> 00:00:04,000
Home.

3
00:00:05,000 --> 00:00:07,000
It's a long way.
";

/// Language that makes [`StubOracle`] hang until its call is dropped
pub const HANGING_LANGUAGE: &str = "hang";

/// Uppercases its input, or fails every call when `failing`
#[derive(Default)]
pub struct StubOracle {
    pub calls: AtomicU32,
    pub failing: bool,
}

impl StubOracle {
    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failing: true,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for StubOracle {
    async fn translate(&self, request: &OracleRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(SubflowError::Translation("503 Service Unavailable".to_string()));
        }
        if request.language == HANGING_LANGUAGE {
            std::future::pending::<()>().await;
        }
        Ok(request.text.to_uppercase())
    }
}

/// Video with one SubRip and one image-based track
pub struct StubMedia;

#[async_trait]
impl MediaToolkit for StubMedia {
    async fn locate(&self) -> Result<String> {
        Ok("/usr/bin/ffmpeg".to_string())
    }

    async fn probe(&self, video_path: &Path) -> Result<VideoInfo> {
        Ok(VideoInfo {
            path: video_path.to_path_buf(),
            subtitle_tracks: vec![
                SubtitleTrack {
                    index: 2,
                    language: Some("eng".to_string()),
                    title: Some("English".to_string()),
                    format: "subrip".to_string(),
                },
                SubtitleTrack {
                    index: 3,
                    language: Some("eng".to_string()),
                    title: None,
                    format: "hdmv_pgs_subtitle".to_string(),
                },
            ],
        })
    }

    async fn extract_subtitle(&self, _video_path: &Path, stream_index: u32) -> Result<String> {
        if stream_index == 2 {
            Ok(SAMPLE_SRT.to_string())
        } else {
            Err(SubflowError::Media(format!("stream {} is not text", stream_index)))
        }
    }
}

pub fn context_with(oracle: Arc<StubOracle>, retry: RetryPolicy) -> RpcContext {
    RpcContext::new(
        Store::new(),
        Arc::new(TranslationPipeline::new(oracle, retry)),
        Arc::new(StubMedia),
        JobDefaults {
            model: "gemini-1.5-flash-8b".to_string(),
            batch_size: 2,
        },
    )
}

pub fn context() -> (RpcContext, Arc<StubOracle>) {
    let oracle = Arc::new(StubOracle::default());
    let context = context_with(oracle.clone(), RetryPolicy::default());
    (context, oracle)
}

pub async fn call(context: &RpcContext, method: &str, params: Value) -> RpcResponse {
    let request = RpcRequest {
        jsonrpc: Some("2.0".to_string()),
        method: method.to_string(),
        params,
        id: json!(1),
    };
    dispatch(context, request).await
}

/// Result of a call that must succeed
pub async fn ok(context: &RpcContext, method: &str, params: Value) -> Value {
    let response = call(context, method, params).await;
    match (response.result, response.error) {
        (Some(result), None) => result,
        (_, error) => panic!("{} failed: {:?}", method, error),
    }
}

/// Error code of a call that must fail
pub async fn error_code(context: &RpcContext, method: &str, params: Value) -> i64 {
    let response = call(context, method, params).await;
    response
        .error
        .unwrap_or_else(|| panic!("{} unexpectedly succeeded", method))
        .code
}

/// Poll `translation.status` until the job leaves its live states
pub async fn wait_until_finished(context: &RpcContext, job_id: &str) -> Value {
    for _ in 0..1000 {
        let status = ok(context, "translation.status", json!([job_id])).await;
        let live = matches!(status["status"].as_str(), Some("pending") | Some("in_progress"));
        if !live {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}
