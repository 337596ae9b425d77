use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_BATCH_SIZE;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-8b";

/// Options a translation job runs with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOptions {
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Target language, as free text or a language code
    pub language: String,
    /// Free-text hint about the piece being translated
    #[serde(default)]
    pub context: String,
    pub model: String,
    pub batch_size: usize,
}

impl TranslationOptions {
    pub fn new<S: Into<String>>(api_key: S, language: S) -> Self {
        Self {
            api_key: api_key.into(),
            language: language.into(),
            context: String::new(),
            model: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// One oracle call: a batch's text plus everything needed to translate it
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub text: String,
    pub language: String,
    pub context: String,
    pub model: String,
    pub api_key: String,
}

impl OracleRequest {
    pub fn for_batch(options: &TranslationOptions, text: String) -> Self {
        Self {
            text,
            language: options.language.clone(),
            context: options.context.clone(),
            model: options.model.clone(),
            api_key: options.api_key.clone(),
        }
    }

    /// Prompt sent to chat-style oracles
    pub fn prompt(&self) -> String {
        format!(
            "I'll give you subtitles batch is srt format. I need you to translate them to {}, \
             understanding the context of the subtitles: {}. \
             You answer should consist of only translated subtitles. \
             Here is the subtitles batch: \n{}",
            self.language, self.context, self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_language_context_and_text() {
        let options = TranslationOptions::new("key", "German").with_context("a space opera");
        let request = OracleRequest::for_batch(&options, "1\n00:00:01,000 --> 00:00:02,000\nHi\n".to_string());

        let prompt = request.prompt();
        assert!(prompt.contains("translate them to German"));
        assert!(prompt.contains("context of the subtitles: a space opera."));
        assert!(prompt.ends_with("Here is the subtitles batch: \n1\n00:00:01,000 --> 00:00:02,000\nHi\n"));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let options = TranslationOptions::new("secret", "fr");
        let json = serde_json::to_value(&options).unwrap();

        assert!(json.get("apiKey").is_none());
        assert_eq!(json["batchSize"], 50);
        assert_eq!(json["model"], DEFAULT_MODEL);
    }
}
