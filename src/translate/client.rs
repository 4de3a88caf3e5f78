use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::interface::SentenceTranslator;
use crate::model_service::{ModelServiceClient, TranslateRequest};
use crate::settings::TranslationConfig;

/// MarianMT (opus-mt ja-en with the railway adapter) served by the model server
pub struct RemoteMarianTranslator {
    model: String,
    max_length: usize,
    num_beams: usize,
    length_penalty: f32,
    model_service: Arc<ModelServiceClient>,
}

impl RemoteMarianTranslator {
    pub fn new(config: &TranslationConfig, model_service: Arc<ModelServiceClient>) -> Self {
        info!(
            "Initialized RemoteMarianTranslator: model={}, base_url={}",
            config.model,
            model_service.base_url()
        );
        Self {
            model: config.model.clone(),
            max_length: config.max_length,
            num_beams: config.num_beams,
            length_penalty: config.length_penalty,
            model_service,
        }
    }
}

#[async_trait]
impl SentenceTranslator for RemoteMarianTranslator {
    async fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, anyhow::Error> {
        let request = TranslateRequest {
            texts: texts.to_vec(),
            model: self.model.clone(),
            max_length: self.max_length,
            num_beams: self.num_beams,
            length_penalty: self.length_penalty,
        };

        debug!("Sending {} sentences to translation model", texts.len());
        let response = self.model_service.translate(&request).await?;

        if response.translations.len() != texts.len() {
            anyhow::bail!(
                "Translation model returned {} results for {} inputs",
                response.translations.len(),
                texts.len()
            );
        }
        Ok(response.translations)
    }

    async fn is_ready(&self) -> bool {
        self.model_service.health_check().await.unwrap_or(false)
    }
}
