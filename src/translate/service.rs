use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::entity::EntityTranslator;
use super::interface::{ResolvedEntity, SentenceTranslator, TranslationOutcome};
use super::postprocess::{clean_model_output, finalize_sentence};
use super::romanize::Romanizer;
use crate::ner::MaskedText;

/// Sentence translation, entity resolution and placeholder substitution.
pub struct TranslationService {
    translator: Option<Arc<dyn SentenceTranslator>>,
    entities: EntityTranslator,
    romanizer: Arc<Romanizer>,
    batch_size: usize,
}

impl TranslationService {
    /// `translator` may be `None` when no model is configured; sentences are
    /// then romanized.
    pub fn new(
        translator: Option<Arc<dyn SentenceTranslator>>,
        entities: EntityTranslator,
        romanizer: Arc<Romanizer>,
        batch_size: usize,
    ) -> Self {
        Self {
            translator,
            entities,
            romanizer,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn is_ready(&self) -> bool {
        match &self.translator {
            Some(translator) => translator.is_ready().await,
            None => false,
        }
    }

    /// Translate sentences in batches, one result per input
    pub async fn translate_text(&self, texts: &[String]) -> Result<Vec<String>> {
        let Some(translator) = &self.translator else {
            warn!("Translation model not loaded, romanizing {} sentences", texts.len());
            let mut romanized = Vec::with_capacity(texts.len());
            for text in texts {
                romanized.push(self.romanizer.romanize(text).await);
            }
            return Ok(romanized);
        };

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let translated = translator
                .translate_batch(batch)
                .await
                .context("Sentence translation failed")?;
            results.extend(translated.iter().map(|text| clean_model_output(text)));
        }
        Ok(results)
    }

    /// Translate the masked sentence and fill every placeholder with the
    /// English name of its entity.
    pub async fn process_translation(&self, masked: &MaskedText) -> Result<TranslationOutcome> {
        let sentence = self
            .translate_text(std::slice::from_ref(&masked.text))
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| masked.text.clone());
        debug!("Model translation: {}", sentence);

        let resolved = join_all(masked.entities.iter().map(|entity| async move {
            let (english, source) = self.entities.translate_entity(&entity.japanese).await?;
            Ok::<_, anyhow::Error>(ResolvedEntity {
                placeholder: entity.placeholder.clone(),
                japanese: entity.japanese.clone(),
                entity_type: entity.entity_type.clone(),
                english,
                source,
            })
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let substituted = resolved.iter().fold(sentence, |text, entity| {
            text.replace(&entity.placeholder, &entity.english)
        });
        let english_translation = finalize_sentence(&substituted);

        info!("Translation completed: {} entities processed", resolved.len());
        Ok(TranslationOutcome {
            english_translation,
            entities: resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseService;
    use crate::ner::masking::MaskedEntity;
    use crate::translate::interface::EntitySource;
    use crate::translate::romanize::ScriptTagger;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a fixed sentence for every input and records batch sizes
    struct FixedTranslator {
        output: String,
        batches: Mutex<Vec<usize>>,
    }

    impl FixedTranslator {
        fn new(output: &str) -> Self {
            Self {
                output: output.to_string(),
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SentenceTranslator for FixedTranslator {
        async fn translate_batch(&self, texts: &[String]) -> Result<Vec<String>, anyhow::Error> {
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|_| self.output.clone()).collect())
        }

        async fn is_ready(&self) -> bool {
            true
        }
    }

    struct BrokenTranslator;

    #[async_trait]
    impl SentenceTranslator for BrokenTranslator {
        async fn translate_batch(&self, _texts: &[String]) -> Result<Vec<String>, anyhow::Error> {
            Err(anyhow::anyhow!("model server unreachable"))
        }

        async fn is_ready(&self) -> bool {
            false
        }
    }

    fn service(
        translator: Option<Arc<dyn SentenceTranslator>>,
        store: Arc<DatabaseService>,
        batch_size: usize,
    ) -> TranslationService {
        let romanizer = Arc::new(Romanizer::new(Arc::new(ScriptTagger)));
        let entities = EntityTranslator::new(store, None, romanizer.clone(), true, false);
        TranslationService::new(translator, entities, romanizer, batch_size)
    }

    fn masked(text: &str, entities: &[(&str, &str)]) -> MaskedText {
        MaskedText {
            text: text.to_string(),
            entities: entities
                .iter()
                .map(|(placeholder, japanese)| MaskedEntity {
                    placeholder: placeholder.to_string(),
                    japanese: japanese.to_string(),
                    entity_type: "地名".to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn substitutes_store_translation() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());
        store.add_entity("東京", "Tokyo").await.unwrap();
        let translator: Arc<dyn SentenceTranslator> = Arc::new(FixedTranslator::new("Next is [PH1]"));

        let outcome = service(Some(translator), store, 16)
            .process_translation(&masked("次は[PH1]です", &[("[PH1]", "東京")]))
            .await
            .unwrap();

        assert_eq!(outcome.english_translation, "Next is Tokyo");
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].source, EntitySource::Database);
    }

    #[tokio::test]
    async fn resolves_entities_in_placeholder_order() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());
        store.add_entity("新宿", "Shinjuku").await.unwrap();
        let translator: Arc<dyn SentenceTranslator> =
            Arc::new(FixedTranslator::new("The [PH1] bound for [PH2] , [PH2] ."));

        let outcome = service(Some(translator), store, 16)
            .process_translation(&masked(
                "[PH1]の[PH2]行きです",
                &[("[PH1]", "なりたエクスプレス"), ("[PH2]", "新宿")],
            ))
            .await
            .unwrap();

        assert_eq!(outcome.english_translation, "The Narita Express bound for Shinjuku.");
        let placeholders: Vec<&str> = outcome.entities.iter().map(|e| e.placeholder.as_str()).collect();
        assert_eq!(placeholders, ["[PH1]", "[PH2]"]);
        assert_eq!(outcome.entities[0].source, EntitySource::SuffixRule);
    }

    #[tokio::test]
    async fn translates_in_batches() {
        let store = Arc::new(DatabaseService::disconnected());
        let translator = Arc::new(FixedTranslator::new("Hello ."));
        let texts: Vec<String> = (0..5).map(|i| format!("文{}", i)).collect();

        let out = service(Some(translator.clone() as Arc<dyn SentenceTranslator>), store, 2)
            .translate_text(&texts)
            .await
            .unwrap();

        assert_eq!(out, vec!["Hello.".to_string(); 5]);
        assert_eq!(*translator.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn romanizes_without_a_model() {
        let store = Arc::new(DatabaseService::disconnected());
        let translation = service(None, store, 16);

        assert!(!translation.is_ready().await);
        let out = translation.translate_text(&["ありがとう".to_string()]).await.unwrap();
        assert_eq!(out, vec!["Arigatou".to_string()]);
    }

    #[tokio::test]
    async fn model_failure_is_an_error() {
        let store = Arc::new(DatabaseService::disconnected());
        let translator: Arc<dyn SentenceTranslator> = Arc::new(BrokenTranslator);

        let result = service(Some(translator), store, 16)
            .process_translation(&masked("こんにちは", &[]))
            .await;
        assert!(result.is_err());
    }
}
