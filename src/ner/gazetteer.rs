use std::cmp::Reverse;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::interface::{EntityRecognizer, RecognizedEntity};
use crate::database::DatabaseService;
use crate::settings::read_string_map;

/// Dictionary recognizer for running without the model server.
///
/// Matches known names with a left-to-right longest-match scan. Names come
/// from a gazetteer file and from the entity store's cache, so entities
/// added through the API are recognized on the next request.
pub struct GazetteerRecognizer {
    terms: Vec<(String, String)>,
    store: Option<Arc<DatabaseService>>,
    default_tag: String,
}

impl GazetteerRecognizer {
    pub fn new(
        terms: Vec<(String, String)>,
        store: Option<Arc<DatabaseService>>,
        default_tag: impl Into<String>,
    ) -> Self {
        Self {
            terms,
            store,
            default_tag: default_tag.into(),
        }
    }

    /// Load a JSON or YAML object of surface form -> entity tag.
    pub fn load_terms(path: &str) -> Result<Vec<(String, String)>> {
        let terms = read_string_map(path).context("Invalid gazetteer file")?;
        info!("Loaded {} gazetteer terms from {}", terms.len(), path);
        Ok(terms.into_iter().collect())
    }

    fn dictionary(&self) -> Vec<(Vec<char>, String)> {
        let mut dictionary: Vec<(Vec<char>, String)> = self
            .terms
            .iter()
            .map(|(surface, tag)| (surface.chars().collect(), tag.clone()))
            .collect();

        if let Some(store) = &self.store {
            dictionary.extend(
                store
                    .cached_names()
                    .into_iter()
                    .map(|name| (name.chars().collect(), self.default_tag.clone())),
            );
        }

        dictionary.retain(|(surface, _)| !surface.is_empty());
        dictionary.sort_by_key(|(surface, _)| Reverse(surface.len()));
        dictionary
    }
}

#[async_trait]
impl EntityRecognizer for GazetteerRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>, anyhow::Error> {
        let dictionary = self.dictionary();
        let chars: Vec<char> = text.chars().collect();
        let mut entities = Vec::new();

        let mut position = 0;
        while position < chars.len() {
            let hit = dictionary.iter().find(|(surface, _)| {
                chars[position..].starts_with(surface)
            });

            match hit {
                Some((surface, tag)) => {
                    entities.push(RecognizedEntity {
                        entity_group: tag.clone(),
                        word: surface.iter().collect(),
                        start: Some(position),
                        end: Some(position + surface.len()),
                        score: 1.0,
                    });
                    position += surface.len();
                }
                None => position += 1,
            }
        }

        Ok(entities)
    }

    async fn is_ready(&self) -> bool {
        !self.terms.is_empty()
            || self
                .store
                .as_ref()
                .map(|store| store.is_connected())
                .unwrap_or(false)
    }
}
