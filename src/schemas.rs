use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::translate::{EntitySource, ResolvedEntity};

#[derive(Debug, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
}

/// How one placeholder was filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMappingEntry {
    pub japanese: String,
    pub entity_type: String,
    pub english: String,
    pub source: EntitySource,
}

impl From<ResolvedEntity> for EntityMappingEntry {
    fn from(entity: ResolvedEntity) -> Self {
        Self {
            japanese: entity.japanese,
            entity_type: entity.entity_type,
            english: entity.english,
            source: entity.source,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub original_text: String,
    pub text_with_placeholders: String,
    pub entity_mapping: BTreeMap<String, EntityMappingEntry>,
    pub english_translation: String,
    pub entities_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub ner_service: bool,
    pub translation_service: bool,
    pub database_service: bool,
}

impl ServiceStatus {
    pub fn all_ready(&self) -> bool {
        self.ner_service && self.translation_service && self.database_service
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: ServiceStatus,
    pub database_entities_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct EntitySearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntitySearchResponse {
    pub query: String,
    pub results: BTreeMap<String, String>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct EntityAddQuery {
    #[serde(default)]
    pub japanese: String,
    #[serde(default)]
    pub english: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntityAddResponse {
    pub message: String,
    pub japanese: String,
    pub english: String,
}
