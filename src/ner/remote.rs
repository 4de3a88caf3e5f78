use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::interface::{EntityRecognizer, RecognizedEntity};
use crate::model_service::{ModelServiceClient, NerRequest};
use crate::settings::NerConfig;

/// BERT token-classification model served by the model server
pub struct RemoteNerModel {
    model: String,
    tokenizer: String,
    aggregation_strategy: String,
    model_service: Arc<ModelServiceClient>,
}

impl RemoteNerModel {
    pub fn new(config: &NerConfig, model_service: Arc<ModelServiceClient>) -> Self {
        info!(
            "Initialized RemoteNerModel: model={}, tokenizer={}, base_url={}",
            config.model,
            config.base_tokenizer,
            model_service.base_url()
        );
        Self {
            model: config.model.clone(),
            tokenizer: config.base_tokenizer.clone(),
            aggregation_strategy: config.aggregation_strategy.clone(),
            model_service,
        }
    }
}

#[async_trait]
impl EntityRecognizer for RemoteNerModel {
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>, anyhow::Error> {
        let request = NerRequest {
            text: text.to_string(),
            model: self.model.clone(),
            tokenizer: self.tokenizer.clone(),
            aggregation_strategy: self.aggregation_strategy.clone(),
        };

        let response = self.model_service.recognize(&request).await?;
        debug!("NER model returned {} raw entities", response.entities.len());
        Ok(response.entities)
    }

    async fn is_ready(&self) -> bool {
        self.model_service.health_check().await.unwrap_or(false)
    }
}
