use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entity as produced by a token-classification model with simple
/// aggregation. Offsets are character offsets into the input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedEntity {
    pub entity_group: String,
    pub word: String,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
    #[serde(default)]
    pub score: f32,
}

/// Named entity recognizer interface
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Detect entities in `text`
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>, anyhow::Error>;

    /// Whether the underlying model is loaded and reachable
    async fn is_ready(&self) -> bool;
}
