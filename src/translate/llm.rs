//! LLM translation provider
//!
//! Talks to an OpenAI-compatible chat completions endpoint (a local
//! runtime or a hosted API). Each block is translated with its own chat
//! call so a single bad response cannot poison the whole frame; the calls
//! run concurrently and partial results are returned as-is.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::config::TranslationSettings;

use super::{
    BlockText, TranslateError, TranslatedBlock, TranslationProvider, TranslationRequest,
    TranslationResponse,
};

/// Translation provider backed by an OpenAI-compatible chat endpoint
pub struct LlmTranslator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl LlmTranslator {
    /// Build a translator from the configured settings; the API key is
    /// read from the named environment variable when one is configured.
    pub fn new(settings: &TranslationSettings) -> Self {
        let api_key = settings
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key,
        }
    }

    fn system_prompt(context: &str, target_language: &str) -> String {
        let mut prompt = format!(
            "You translate on-screen text into {target_language}. \
             Reply with the translation only, no commentary."
        );
        if !context.is_empty() {
            prompt.push_str("\nPreviously translated text, oldest first:\n");
            prompt.push_str(context);
        }
        prompt
    }

    async fn translate_block(
        &self,
        block: &BlockText,
        system: &str,
    ) -> Result<TranslatedBlock, TranslateError> {
        let chat = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &block.text,
                },
            ],
            temperature: 0.2,
        };

        let mut request = self.client.post(&self.endpoint).json(&chat);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TranslateError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TranslateError::Provider(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::Decode(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| TranslateError::Decode("response held no choices".to_string()))?;

        Ok(TranslatedBlock {
            id: block.id,
            generation: block.generation,
            text,
        })
    }
}

#[async_trait]
impl TranslationProvider for LlmTranslator {
    fn name(&self) -> &str {
        "llm"
    }

    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, TranslateError> {
        let system = Self::system_prompt(&request.context, &request.target_language);

        let results = join_all(
            request
                .blocks
                .iter()
                .map(|block| self.translate_block(block, &system)),
        )
        .await;

        let mut blocks = Vec::with_capacity(results.len());
        let mut last_error = None;
        for result in results {
            match result {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    warn!("block translation failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        // All-failed is a provider failure; partial results are fine.
        if blocks.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Ok(TranslationResponse { blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_includes_context() {
        let prompt = LlmTranslator::system_prompt("line one\nline two", "de");
        assert!(prompt.contains("into de"));
        assert!(prompt.contains("line one\nline two"));
    }

    #[test]
    fn test_system_prompt_without_context() {
        let prompt = LlmTranslator::system_prompt("", "en");
        assert!(!prompt.contains("Previously translated"));
    }

    #[test]
    fn test_chat_response_parsing() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":" Hello "}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content, " Hello ");
    }
}
