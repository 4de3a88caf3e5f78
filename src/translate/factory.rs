use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::client::RemoteMarianTranslator;
use super::entity::EntityTranslator;
use super::interface::SentenceTranslator;
use super::knowledge::{KnowledgeBase, WikidataClient};
use super::romanize::{ReadingTagger, RemoteReadingTagger, Romanizer, ScriptTagger};
use super::service::TranslationService;
use crate::database::DatabaseService;
use crate::model_service::ModelServiceClient;
use crate::settings::{KnowledgeBaseConfig, RomanizationConfig, Settings, TranslationConfig};

/// Factory for the translation pipeline and its collaborators
pub struct TranslationFactory;

impl TranslationFactory {
    /// Sentence translator for `translation_config.provider`; `None` when
    /// the provider is `none`.
    pub fn create_translator(
        config: &TranslationConfig,
        model_service: Arc<ModelServiceClient>,
    ) -> Result<Option<Arc<dyn SentenceTranslator>>> {
        info!("Initializing translation provider: {}", config.provider);

        match config.provider.as_str() {
            "remote" => Ok(Some(Arc::new(RemoteMarianTranslator::new(config, model_service)))),
            "none" => Ok(None),
            other => Err(anyhow::anyhow!("Unsupported translation provider: {}", other)),
        }
    }

    pub fn create_tagger(
        config: &RomanizationConfig,
        model_service: Arc<ModelServiceClient>,
    ) -> Result<Arc<dyn ReadingTagger>> {
        match config.tagger.as_str() {
            "remote" => Ok(Arc::new(RemoteReadingTagger::new(model_service))),
            "script" => Ok(Arc::new(ScriptTagger)),
            other => Err(anyhow::anyhow!("Unsupported reading tagger: {}", other)),
        }
    }

    pub fn create_knowledge_base(
        config: &KnowledgeBaseConfig,
    ) -> Result<Option<Arc<dyn KnowledgeBase>>> {
        if !config.enabled {
            info!("Knowledge base lookups disabled");
            return Ok(None);
        }
        Ok(Some(Arc::new(WikidataClient::new(config)?)))
    }

    /// Assemble the full translation service from settings
    pub fn create_service(
        settings: &Settings,
        model_service: Arc<ModelServiceClient>,
        store: Arc<DatabaseService>,
    ) -> Result<TranslationService> {
        let config = &settings.translation_config;

        let translator = Self::create_translator(config, model_service.clone())?;
        let tagger = Self::create_tagger(&settings.romanization_config, model_service)?;
        let romanizer = Arc::new(Romanizer::new(tagger));
        let knowledge_base = Self::create_knowledge_base(&settings.knowledge_base_config)?;

        let entities = EntityTranslator::new(
            store,
            knowledge_base,
            romanizer.clone(),
            config.use_db_cache,
            config.persist_resolved_entities,
        );

        Ok(TranslationService::new(
            translator,
            entities,
            romanizer,
            config.batch_size,
        ))
    }
}
