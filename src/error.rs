use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Job not found")]
    JobNotFound,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Translation oracle unavailable after {attempts} attempts: {last_error}")]
    OracleUnavailable { attempts: u32, last_error: String },

    #[error("Translation cancelled")]
    Cancelled,

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SubflowError {
    /// JSON-RPC error code reported for this error
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::InvalidParams(_) => -32602,
            Self::SessionNotFound
            | Self::JobNotFound
            | Self::FileNotFound(_)
            | Self::InvalidState(_) => -32603,
            _ => -32000,
        }
    }
}

pub type Result<T> = std::result::Result<T, SubflowError>;
