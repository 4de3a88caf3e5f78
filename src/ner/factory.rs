use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::gazetteer::GazetteerRecognizer;
use super::interface::EntityRecognizer;
use super::remote::RemoteNerModel;
use crate::database::DatabaseService;
use crate::model_service::ModelServiceClient;
use crate::settings::NerConfig;

/// Factory for creating entity recognizers
pub struct NerFactory;

impl NerFactory {
    /// Create a recognizer based on `ner_config.provider`
    pub fn create_recognizer(
        ner_config: &NerConfig,
        model_service: Arc<ModelServiceClient>,
        store: Arc<DatabaseService>,
    ) -> Result<Arc<dyn EntityRecognizer>> {
        info!("Initializing NER provider: {}", ner_config.provider);

        match ner_config.provider.as_str() {
            "remote" => Ok(Arc::new(RemoteNerModel::new(ner_config, model_service))),
            "gazetteer" => {
                let terms = match &ner_config.gazetteer_path {
                    Some(path) => GazetteerRecognizer::load_terms(path)?,
                    None => Vec::new(),
                };
                Ok(Arc::new(GazetteerRecognizer::new(
                    terms,
                    Some(store),
                    ner_config.default_tag.clone(),
                )))
            }
            other => Err(anyhow::anyhow!("Unsupported NER provider: {}", other)),
        }
    }
}
