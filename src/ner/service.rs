use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use super::interface::EntityRecognizer;
use super::masking::{EntityMasker, MaskedText};

/// Recognizer plus masking rules: the first stage of the pipeline.
pub struct NerService {
    recognizer: Arc<dyn EntityRecognizer>,
    masker: EntityMasker,
}

impl NerService {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, tags: &[String]) -> Self {
        Self {
            recognizer,
            masker: EntityMasker::new(tags),
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.recognizer.is_ready().await
    }

    /// Replace entities with `[PHn]` placeholders and return the mapping.
    pub async fn replace_entities_and_map(&self, text: &str) -> Result<MaskedText> {
        let entities = self
            .recognizer
            .recognize(text)
            .await
            .context("Named entity recognition failed")?;

        let masked = self.masker.mask(text, entities);
        info!("Processed NER: found {} entities", masked.entities.len());
        Ok(masked)
    }
}
