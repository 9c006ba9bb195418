//! Echo translation provider for tests and `--mock` runs

use async_trait::async_trait;

use super::{
    TranslateError, TranslatedBlock, TranslationProvider, TranslationRequest, TranslationResponse,
};

/// Provider that "translates" by tagging the source text with the target
/// language. Deterministic and offline.
#[derive(Debug, Default)]
pub struct EchoTranslator;

#[async_trait]
impl TranslationProvider for EchoTranslator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, TranslateError> {
        Ok(TranslationResponse {
            blocks: request
                .blocks
                .iter()
                .map(|b| TranslatedBlock {
                    id: b.id,
                    generation: b.generation,
                    text: format!("[{}] {}", request.target_language, b.text),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockId, Rect};
    use crate::translate::BlockText;

    #[tokio::test]
    async fn test_echo_preserves_id_and_generation() {
        let request = TranslationRequest {
            blocks: vec![BlockText {
                id: BlockId(2),
                generation: 5,
                text: "こんにちは".to_string(),
                rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            }],
            context: String::new(),
            target_language: "en".to_string(),
        };
        let response = EchoTranslator.translate(&request).await.unwrap();
        assert_eq!(response.blocks.len(), 1);
        assert_eq!(response.blocks[0].id, BlockId(2));
        assert_eq!(response.blocks[0].generation, 5);
        assert_eq!(response.blocks[0].text, "[en] こんにちは");
    }
}
