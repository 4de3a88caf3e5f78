use serde::{Deserialize, Serialize};

/// One row of the `train_entity` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kanji: String,
    pub english: String,
    /// RFC 3339
    pub created_at: String,
    /// RFC 3339
    pub updated_at: String,
}
