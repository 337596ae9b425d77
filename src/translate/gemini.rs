use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, SubflowError};
use super::{Oracle, OracleRequest};

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined in order
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Oracle backed by the Generative Language `generateContent` endpoint
pub struct GeminiOracle {
    client: Client,
    endpoint: String,
}

impl GeminiOracle {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("subflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn translate(&self, request: &OracleRequest) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(request.prompt()) }],
            }],
        };

        let url = self.url(&request.model);
        debug!("Sending translation request to: {}", url);

        let response = self.client
            .post(&url)
            .query(&[("key", request.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| SubflowError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubflowError::Translation(format!(
                "Gemini API error {}: {}", status, error_text
            )));
        }

        let parsed: GenerateContentResponse = response.json().await
            .map_err(|e| SubflowError::Translation(format!("Failed to parse response: {}", e)))?;

        Ok(parsed.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_first_candidate_parts() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "1\nHallo"}, {"text": "\n\n2\nWelt"}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text(), "1\nHallo\n\n2\nWelt");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let parsed: GenerateContentResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert_eq!(parsed.text(), "");
    }

    #[test]
    fn test_url_uses_model_and_trims_endpoint() {
        let config = TranslateConfig {
            endpoint: "https://example.test/".to_string(),
            ..TranslateConfig::default()
        };
        let oracle = GeminiOracle::new(&config).unwrap();
        assert_eq!(
            oracle.url("gemini-1.5-flash-8b"),
            "https://example.test/v1beta/models/gemini-1.5-flash-8b:generateContent"
        );
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out_as_failed_attempt() {
        // accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = TranslateConfig {
            endpoint: format!("http://{}", address),
            request_timeout_secs: 1,
            ..TranslateConfig::default()
        };
        let oracle = GeminiOracle::new(&config).unwrap();
        let request = OracleRequest::for_batch(&crate::translate::TranslationOptions::new("key", "en"), "1\nHi\n".to_string());

        let err = oracle.translate(&request).await.unwrap_err();
        assert!(matches!(err, SubflowError::Translation(_)));
        server.abort();
    }
}
