use std::sync::Arc;

use crate::database::DatabaseService;
use crate::model_service::ModelServiceClient;
use crate::ner::{NerFactory, NerService};
use crate::settings::Settings;
use crate::translate::{TranslationFactory, TranslationService};

#[derive(Clone)]
pub struct AppState {
    pub ner: Arc<NerService>,
    pub translation: Arc<TranslationService>,
    pub database: Arc<DatabaseService>,
}

impl AppState {
    /// Connect the entity store and build every collaborator from settings.
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let model_service = Arc::new(ModelServiceClient::new(&settings.model_service)?);
        let database = Arc::new(DatabaseService::connect(&settings.database_config).await);

        let recognizer = NerFactory::create_recognizer(
            &settings.ner_config,
            model_service.clone(),
            database.clone(),
        )?;
        let ner = Arc::new(NerService::new(recognizer, &settings.ner_config.tags));

        let translation = Arc::new(TranslationFactory::create_service(
            settings,
            model_service,
            database.clone(),
        )?);

        Ok(Self {
            ner,
            translation,
            database,
        })
    }
}
