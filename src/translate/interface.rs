use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Japanese -> English sentence translation model
#[async_trait]
pub trait SentenceTranslator: Send + Sync {
    /// Translate a batch of sentences, one output per input, in order.
    /// Placeholders such as `[PH1]` must pass through untouched.
    async fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, anyhow::Error>;

    /// Whether the model is loaded and reachable
    async fn is_ready(&self) -> bool;
}

/// Where an entity's English text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    Database,
    KnowledgeBase,
    SuffixRule,
    Romanization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub placeholder: String,
    pub japanese: String,
    pub entity_type: String,
    pub english: String,
    pub source: EntitySource,
}

/// Final sentence plus how each placeholder was filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationOutcome {
    pub english_translation: String,
    pub entities: Vec<ResolvedEntity>,
}
