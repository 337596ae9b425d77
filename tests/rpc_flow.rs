//! End-to-end flows through the JSON-RPC dispatcher

use assert_fs::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use subflow::translate::RetryPolicy;

mod common;

use common::{
    call, context, context_with, error_code, ok, wait_until_finished, StubOracle, HANGING_LANGUAGE,
    SAMPLE_SRT,
};

#[tokio::test]
async fn test_subtitle_session_translate_and_save() {
    let temp = assert_fs::TempDir::new().unwrap();
    let input = temp.child("episode.srt");
    input.write_str(SAMPLE_SRT).unwrap();
    let output = temp.child("episode.fr.srt");

    let (context, oracle) = context();
    let session = ok(&context, "session.create", json!([])).await;
    let session_id = session["sessionId"].as_str().unwrap().to_string();

    let loaded = ok(
        &context,
        "file.load",
        json!([session_id, input.path().to_string_lossy()]),
    )
    .await;
    assert_eq!(loaded["type"], "subtitle");

    let started = ok(
        &context,
        "translation.start",
        json!([session_id, {"apiKey": "key", "language": "fr", "context": "a road movie"}]),
    )
    .await;
    let job_id = started["jobId"].as_str().unwrap().to_string();

    let status = wait_until_finished(&context, &job_id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100);
    assert!(status["completedAt"].is_string());
    assert!(status["error"].is_null());

    // three replicas with the default batch size of two
    assert_eq!(oracle.calls(), 2);

    let result = ok(&context, "translation.result", json!([job_id])).await;
    let translated = result["translatedText"].as_str().unwrap().to_string();
    assert!(translated.contains("WHERE ARE WE GOING?"));
    assert!(translated.ends_with('\n'));

    let saved = ok(
        &context,
        "translation.save",
        json!([job_id, output.path().to_string_lossy()]),
    )
    .await;
    assert_eq!(saved["size"], translated.chars().count());
    output.assert(translated.as_str());

    let listed = ok(&context, "sessions.list", json!([])).await;
    assert_eq!(
        listed["sessions"],
        json!([{
            "id": session_id,
            "hasFile": true,
            "fileType": "subtitle",
            "hasJob": true,
            "jobStatus": "completed",
        }])
    );
}

#[tokio::test]
async fn test_video_session_extracts_before_translating() {
    let temp = assert_fs::TempDir::new().unwrap();
    let video = temp.child("film.mkv");
    video.write_binary(&[0x1a, 0x45, 0xdf, 0xa3]).unwrap();

    let (context, _oracle) = context();
    let session_id = ok(&context, "session.create", json!([])).await["sessionId"]
        .as_str()
        .unwrap()
        .to_string();

    ok(&context, "file.load", json!([session_id, video.path().to_string_lossy()])).await;

    // no text yet: translation needs an extracted track
    let code = error_code(
        &context,
        "translation.start",
        json!([session_id, {"apiKey": "key", "language": "de"}]),
    )
    .await;
    assert_eq!(code, -32603);

    let listed = ok(&context, "subtitles.list", json!([session_id])).await;
    assert_eq!(
        listed["subtitles"],
        json!([{"id": 0, "language": "eng", "codec": "subrip", "title": "English"}])
    );

    let extracted = ok(&context, "subtitle.extract", json!([session_id, 0])).await;
    assert_eq!(extracted["contentLength"], SAMPLE_SRT.chars().count());

    let info = ok(&context, "file.info", json!([session_id])).await;
    assert_eq!(info["type"], "video");
    assert_eq!(info["hasExtractedSubtitle"], true);

    let started = ok(
        &context,
        "translation.start",
        json!([session_id, {"apiKey": "key", "language": "de"}]),
    )
    .await;
    let status = wait_until_finished(&context, started["jobId"].as_str().unwrap()).await;
    assert_eq!(status["status"], "completed");
}

#[tokio::test]
async fn test_new_job_supersedes_running_job() {
    let (context, _oracle) = context();
    let session_id = context.store.create_session();
    context
        .store
        .load_file(
            &session_id,
            subflow::store::LoadedFile::subtitle("a.srt".into(), SAMPLE_SRT.to_string()),
        )
        .unwrap();

    let first = ok(
        &context,
        "translation.start",
        json!([session_id, {"apiKey": "key", "language": HANGING_LANGUAGE}]),
    )
    .await;
    let first_id = first["jobId"].as_str().unwrap().to_string();
    tokio::task::yield_now().await;

    let second = ok(
        &context,
        "translation.start",
        json!([session_id, {"apiKey": "key", "language": "it"}]),
    )
    .await;
    let second_id = second["jobId"].as_str().unwrap().to_string();

    // the superseded job stays queryable under its own id
    let old = wait_until_finished(&context, &first_id).await;
    assert_eq!(old["status"], "cancelled");

    let new = wait_until_finished(&context, &second_id).await;
    assert_eq!(new["status"], "completed");

    let code = error_code(&context, "translation.result", json!([first_id])).await;
    assert_eq!(code, -32603);

    let session = ok(&context, "session.get", json!([session_id])).await;
    assert_eq!(session["jobId"], second_id.as_str());
}

#[tokio::test]
async fn test_cancel_running_job() {
    let (context, _oracle) = context();
    let session_id = context.store.create_session();
    context
        .store
        .load_file(
            &session_id,
            subflow::store::LoadedFile::subtitle("a.srt".into(), SAMPLE_SRT.to_string()),
        )
        .unwrap();

    let started = ok(
        &context,
        "translation.start",
        json!([session_id, {"apiKey": "key", "language": HANGING_LANGUAGE}]),
    )
    .await;
    let job_id = started["jobId"].as_str().unwrap().to_string();

    let cancelled = ok(&context, "translation.cancel", json!([job_id])).await;
    assert_eq!(cancelled["success"], true);

    let status = wait_until_finished(&context, &job_id).await;
    assert_eq!(status["status"], "cancelled");
    assert!(status["completedAt"].is_string());
}

#[tokio::test]
async fn test_unreachable_oracle_ends_job_as_unavailable() {
    let oracle = Arc::new(StubOracle::failing());
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        multiplier: 1.0,
        max_delay: Duration::from_millis(1),
    };
    let context = context_with(oracle.clone(), policy);
    let session_id = context.store.create_session();
    context
        .store
        .load_file(
            &session_id,
            subflow::store::LoadedFile::subtitle("a.srt".into(), SAMPLE_SRT.to_string()),
        )
        .unwrap();

    let started = ok(
        &context,
        "translation.start",
        json!([session_id, {"apiKey": "key", "language": "pt"}]),
    )
    .await;
    let status = wait_until_finished(&context, started["jobId"].as_str().unwrap()).await;

    assert_eq!(status["status"], "oracle_unavailable");
    assert!(status["error"].as_str().unwrap().contains("503"));
    // the first batch exhausted its attempts; the second was never sent
    assert_eq!(oracle.calls(), 3);
}

#[tokio::test]
async fn test_error_codes() {
    let (context, _oracle) = context();

    let response = call(&context, "no.such.method", json!([])).await;
    assert_eq!(response.error.unwrap().code, -32601);

    assert_eq!(error_code(&context, "session.get", json!([])).await, -32602);
    assert_eq!(error_code(&context, "session.get", json!(["missing"])).await, -32603);
    assert_eq!(error_code(&context, "translation.status", json!(["missing"])).await, -32603);
    assert_eq!(error_code(&context, "translation.save", json!(["missing"])).await, -32602);

    let session_id = context.store.create_session();
    assert_eq!(
        error_code(&context, "file.load", json!([session_id, "/no/such/movie.srt"])).await,
        -32603
    );
    assert_eq!(
        error_code(
            &context,
            "translation.start",
            json!([session_id, {"apiKey": "key", "language": "fr", "batchSize": 0}])
        )
        .await,
        -32602
    );

    assert_eq!(ok(&context, "ping", json!([])).await, json!("pong"));
    assert_eq!(ok(&context, "init", json!([])).await["ffmpegPath"], "/usr/bin/ffmpeg");
}

#[tokio::test]
async fn test_session_clear_and_delete() {
    let (context, _oracle) = context();
    let session_id = context.store.create_session();
    assert_ok!(context.store.load_file(
        &session_id,
        subflow::store::LoadedFile::subtitle("a.srt".into(), SAMPLE_SRT.to_string()),
    ));

    let cleared = ok(&context, "session.clear", json!([session_id])).await;
    assert_eq!(cleared["success"], true);
    assert_eq!(error_code(&context, "file.info", json!([session_id])).await, -32603);

    let deleted = ok(&context, "session.delete", json!([session_id])).await;
    assert_eq!(deleted["success"], true);
    let again = ok(&context, "session.delete", json!([session_id])).await;
    assert_eq!(again["success"], false);

    assert_err!(context.store.clear_session(&session_id));
}
