//! Translation Layer
//!
//! Settled blocks are handed to a `TranslationProvider` capability
//! together with the rendered context history. Every request item carries
//! the block identity and its generation; results join back onto blocks by
//! that tag, never by frame number, and the region session discards
//! results whose generation no longer matches.

pub mod llm;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::blocks::{BlockId, Rect};

pub use llm::LlmTranslator;
pub use mock::EchoTranslator;

/// One block's text as sent to the provider
#[derive(Debug, Clone, PartialEq)]
pub struct BlockText {
    pub id: BlockId,
    /// Generation tag echoed back with the result
    pub generation: u64,
    pub text: String,
    pub rect: Rect,
}

/// A translation request for one region's newly settled blocks
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub blocks: Vec<BlockText>,
    /// Rendered context history, oldest to newest
    pub context: String,
    pub target_language: String,
}

/// Translated text for one block
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedBlock {
    pub id: BlockId,
    pub generation: u64,
    pub text: String,
}

/// Provider response; may cover only part of the request when individual
/// block translations fail
#[derive(Debug, Clone, Default)]
pub struct TranslationResponse {
    pub blocks: Vec<TranslatedBlock>,
}

/// Translation capability failure. Never fatal: affected blocks keep their
/// last known state and are retried when they next settle.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Request(String),
    #[error("translation response could not be decoded: {0}")]
    Decode(String),
    #[error("translation provider error: {0}")]
    Provider(String),
}

/// Asynchronous translation capability
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Translate the request's blocks into the target language
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, TranslateError>;
}
