use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::settings::KnowledgeBaseConfig;

/// External source of canonical English names
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// English label for a Japanese name, `None` when nothing matches
    async fn lookup_english(&self, japanese: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
}

/// Wikidata lookup: `wbsearchentities` for the Japanese name, then the
/// English label of the first hit.
pub struct WikidataClient {
    client: Client,
    search_url: String,
    entity_data_url: String,
    language: String,
    search_limit: u32,
}

impl WikidataClient {
    pub fn new(config: &KnowledgeBaseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create knowledge base HTTP client")?;

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            entity_data_url: config.entity_data_url.clone(),
            language: config.language.clone(),
            search_limit: config.search_limit,
        })
    }

    async fn search(&self, japanese: &str) -> Result<Option<String>> {
        let limit = self.search_limit.to_string();
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("action", "wbsearchentities"),
                ("language", self.language.as_str()),
                ("format", "json"),
                ("search", japanese),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: SearchResponse = response.json().await?;
        Ok(body.search.into_iter().next().map(|hit| hit.id))
    }

    async fn english_label(&self, entity_id: &str) -> Result<Option<String>> {
        let url = self.entity_data_url.replace("{id}", entity_id);
        let data: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(english_label_of(&data, entity_id))
    }
}

fn english_label_of(data: &Value, entity_id: &str) -> Option<String> {
    data.get("entities")?
        .get(entity_id)?
        .get("labels")?
        .get("en")?
        .get("value")?
        .as_str()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl KnowledgeBase for WikidataClient {
    async fn lookup_english(&self, japanese: &str) -> Result<Option<String>> {
        let Some(entity_id) = self.search(japanese).await? else {
            debug!("No Wikidata entity for '{}'", japanese);
            return Ok(None);
        };
        self.english_label(&entity_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_english_label() {
        let data = json!({
            "entities": {
                "Q1490": {
                    "labels": {
                        "ja": {"language": "ja", "value": "東京都"},
                        "en": {"language": "en", "value": "Tokyo"}
                    }
                }
            }
        });
        assert_eq!(english_label_of(&data, "Q1490").as_deref(), Some("Tokyo"));
        assert_eq!(english_label_of(&data, "Q2"), None);
    }

    #[test]
    fn missing_or_blank_label_is_a_miss() {
        let data = json!({"entities": {"Q1": {"labels": {"en": {"value": "  "}}}}});
        assert_eq!(english_label_of(&data, "Q1"), None);

        let data = json!({"entities": {"Q1": {"labels": {}}}});
        assert_eq!(english_label_of(&data, "Q1"), None);
    }

    #[test]
    fn search_response_tolerates_missing_hits() {
        let body: SearchResponse = serde_json::from_str(r#"{"searchinfo": {}}"#).unwrap();
        assert!(body.search.is_empty());

        let body: SearchResponse =
            serde_json::from_str(r#"{"search": [{"id": "Q1490", "label": "東京"}]}"#).unwrap();
        assert_eq!(body.search[0].id, "Q1490");
    }
}
