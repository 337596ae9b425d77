// Translation client architecture
//
// - common: request/options types and the prompt shared by all oracles
// - gemini: Generative Language API oracle
// - retry: backoff policy and the cancellable retry loop around one oracle call

pub mod common;
pub mod gemini;
pub mod retry;

use async_trait::async_trait;
use std::sync::Arc;

pub use common::*;
pub use retry::*;
use crate::config::TranslateConfig;
use crate::error::Result;

/// External engine that translates one batch of subtitle text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Translate the batch text in `request`, returning the raw response text
    async fn translate(&self, request: &OracleRequest) -> Result<String>;
}

/// Factory for creating oracle instances
pub struct OracleFactory;

impl OracleFactory {
    /// Create the default oracle implementation (Gemini-based)
    pub fn create_default(config: &TranslateConfig) -> Result<Arc<dyn Oracle>> {
        Ok(Arc::new(gemini::GeminiOracle::new(config)?))
    }
}
