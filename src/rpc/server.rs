use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{Result, SubflowError};
use super::{dispatch, RpcContext, RpcError, RpcRequest, RpcResponse};

/// Build the router serving JSON-RPC on `POST /`
pub fn create_router(context: Arc<RpcContext>) -> Router {
    Router::new()
        .route("/", post(handle_rpc))
        .with_state(context)
}

async fn handle_rpc(State(context): State<Arc<RpcContext>>, body: String) -> Json<Value> {
    let payload: Value = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(_) => return Json(to_value(RpcResponse::failure(Value::Null, RpcError::parse_error()))),
    };

    match payload {
        Value::Array(calls) if !calls.is_empty() => {
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                responses.push(to_value(handle_call(&context, call).await));
            }
            Json(Value::Array(responses))
        }
        call => Json(to_value(handle_call(&context, call).await)),
    }
}

async fn handle_call(context: &RpcContext, call: Value) -> RpcResponse {
    let id = call.get("id").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<RpcRequest>(call) {
        Ok(request) => dispatch(context, request).await,
        Err(_) => RpcResponse::failure(id, RpcError::invalid_request()),
    }
}

fn to_value(response: RpcResponse) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}

/// JSON-RPC server over HTTP
pub struct RpcServer {
    context: Arc<RpcContext>,
    bind_addr: String,
    port: u16,
}

impl RpcServer {
    pub fn new(context: RpcContext, config: &ServerConfig) -> Self {
        Self {
            context: Arc::new(context),
            bind_addr: config.bind_addr.clone(),
            port: config.port,
        }
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let address = format!("{}:{}", self.bind_addr, self.port);
        TcpListener::bind(&address)
            .await
            .map_err(|e| SubflowError::Config(format!("Failed to bind {}: {}", address, e)))
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address: SocketAddr = listener.local_addr()?;
        info!("JSON-RPC server listening on http://{}", address);

        axum::serve(listener, create_router(self.context))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("JSON-RPC server stopped");
        Ok(())
    }

    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}
