// JSON-RPC control surface
//
// - handlers: one function per method, operating on the store and collaborators
// - server: axum transport (POST /)

pub mod handlers;
pub mod server;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub use server::*;
use crate::config::TranslateConfig;
use crate::error::{Result, SubflowError};
use crate::media::MediaToolkit;
use crate::pipeline::TranslationPipeline;
use crate::store::Store;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Methods answered by [`dispatch`], in the order `info` lists them
pub const METHODS: &[&str] = &[
    "init",
    "session.create",
    "session.get",
    "session.delete",
    "session.clear",
    "file.load",
    "file.info",
    "subtitles.list",
    "subtitle.extract",
    "translation.start",
    "translation.status",
    "translation.result",
    "translation.cancel",
    "translation.save",
    "sessions.list",
    "ping",
    "info",
];

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new<S: Into<String>>(code: i64, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }
}

impl From<SubflowError> for RpcError {
    fn from(error: SubflowError) -> Self {
        Self::new(error.rpc_code(), error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Positional request parameters
#[derive(Debug, Clone, Default)]
pub struct Params(Vec<Value>);

impl Params {
    pub fn new(params: Value) -> Self {
        match params {
            Value::Array(values) => Self(values),
            Value::Null => Self(Vec::new()),
            other => Self(vec![other]),
        }
    }

    /// Non-empty string at `index`
    pub fn str(&self, index: usize) -> Option<&str> {
        self.0
            .get(index)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.0.get(index).filter(|v| !v.is_null())
    }

    /// Non-empty strings at each index, or `InvalidParams` naming them all
    pub fn require_strs<const N: usize>(&self, names: [&str; N]) -> Result<[&str; N]> {
        let mut values = [""; N];
        for (index, slot) in values.iter_mut().enumerate() {
            match self.str(index) {
                Some(value) => *slot = value,
                None => {
                    return Err(SubflowError::InvalidParams(format!(
                        "{} required",
                        names.join(" and ")
                    )));
                }
            }
        }
        Ok(values)
    }
}

/// Fallbacks for job options a client leaves out
#[derive(Debug, Clone)]
pub struct JobDefaults {
    pub model: String,
    pub batch_size: usize,
}

impl From<&TranslateConfig> for JobDefaults {
    fn from(config: &TranslateConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            batch_size: config.default_batch_size,
        }
    }
}

/// Everything a method handler can reach
pub struct RpcContext {
    pub store: Store,
    pub pipeline: Arc<TranslationPipeline>,
    pub media: Arc<dyn MediaToolkit>,
    pub defaults: JobDefaults,
}

impl RpcContext {
    pub fn new(
        store: Store,
        pipeline: Arc<TranslationPipeline>,
        media: Arc<dyn MediaToolkit>,
        defaults: JobDefaults,
    ) -> Self {
        Self {
            store,
            pipeline,
            media,
            defaults,
        }
    }
}

/// Route one request to its handler and wrap the outcome
pub async fn dispatch(context: &RpcContext, request: RpcRequest) -> RpcResponse {
    let RpcRequest { method, params, id, .. } = request;
    let params = Params::new(params);
    debug!("RPC {} {:?}", method, id);

    let outcome = match method.as_str() {
        "init" => handlers::init(context).await,
        "session.create" => handlers::session_create(context),
        "session.get" => handlers::session_get(context, &params),
        "session.delete" => handlers::session_delete(context, &params),
        "session.clear" => handlers::session_clear(context, &params),
        "file.load" => handlers::file_load(context, &params).await,
        "file.info" => handlers::file_info(context, &params),
        "subtitles.list" => handlers::subtitles_list(context, &params),
        "subtitle.extract" => handlers::subtitle_extract(context, &params).await,
        "translation.start" => handlers::translation_start(context, &params),
        "translation.status" => handlers::translation_status(context, &params),
        "translation.result" => handlers::translation_result(context, &params),
        "translation.cancel" => handlers::translation_cancel(context, &params),
        "translation.save" => handlers::translation_save(context, &params).await,
        "sessions.list" => handlers::sessions_list(context),
        "ping" => Ok(Value::from("pong")),
        "info" => Ok(handlers::info()),
        _ => return RpcResponse::failure(id, RpcError::method_not_found(&method)),
    };

    match outcome {
        Ok(result) => RpcResponse::success(id, result),
        Err(e) => {
            let error = RpcError::from(e);
            if error.code == -32000 {
                warn!("RPC {} failed: {}", method, error.message);
            } else {
                debug!("RPC {} rejected: {}", method, error.message);
            }
            RpcResponse::failure(id, error)
        }
    }
}
