use std::cmp::Reverse;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::interface::EntitySource;
use super::knowledge::KnowledgeBase;
use super::romanize::{contains_japanese, Romanizer};
use crate::database::DatabaseService;

/// How a trailing railway word is rendered in English
#[derive(Debug, Clone, Copy)]
enum SuffixRendering {
    /// `<base> <word>`
    Spaced(&'static str),
    /// `<base><word>`, for words that carry their own leading space
    Attached(&'static str),
    /// `Toward <base>`
    Toward,
}

const SUFFIX_MAP: [(&str, SuffixRendering); 18] = [
    ("新幹線", SuffixRendering::Spaced("Shinkansen")),
    ("本線", SuffixRendering::Spaced("Main Line")),
    ("線", SuffixRendering::Spaced("Line")),
    ("駅", SuffixRendering::Spaced("Station")),
    ("空港", SuffixRendering::Spaced("Airport")),
    ("方面", SuffixRendering::Toward),
    ("エクスプレス", SuffixRendering::Attached(" Express")),
    ("号", SuffixRendering::Attached(" No.")),
    ("終点", SuffixRendering::Spaced("Terminal")),
    ("鉄道", SuffixRendering::Spaced("Railway")),
    ("都市", SuffixRendering::Spaced("Urban")),
    ("地下鉄", SuffixRendering::Spaced("Subway")),
    ("メトロ", SuffixRendering::Spaced("Metro")),
    ("環状線", SuffixRendering::Spaced("Loop Line")),
    ("モノレール", SuffixRendering::Spaced("Monorail")),
    ("トラム", SuffixRendering::Spaced("Tram")),
    ("バス", SuffixRendering::Spaced("Bus")),
    ("フェリー", SuffixRendering::Spaced("Ferry")),
];

/// Suffix rules, longest word first
static SORTED_SUFFIXES: Lazy<Vec<(&'static str, SuffixRendering)>> = Lazy::new(|| {
    let mut suffixes = SUFFIX_MAP.to_vec();
    suffixes.sort_by_key(|(suffix, _)| Reverse(suffix.chars().count()));
    suffixes
});

/// Resolves the English name of one masked entity.
///
/// Sources are tried in order: entity store, knowledge base, railway suffix
/// rule, full romanization. The first hit wins.
pub struct EntityTranslator {
    store: Arc<DatabaseService>,
    knowledge_base: Option<Arc<dyn KnowledgeBase>>,
    romanizer: Arc<Romanizer>,
    use_db_cache: bool,
    persist_resolved: bool,
}

impl EntityTranslator {
    pub fn new(
        store: Arc<DatabaseService>,
        knowledge_base: Option<Arc<dyn KnowledgeBase>>,
        romanizer: Arc<Romanizer>,
        use_db_cache: bool,
        persist_resolved: bool,
    ) -> Self {
        Self {
            store,
            knowledge_base,
            romanizer,
            use_db_cache,
            persist_resolved,
        }
    }

    pub async fn translate_entity(&self, japanese: &str) -> Result<(String, EntitySource)> {
        let japanese = japanese.trim();
        if japanese.is_empty() {
            return Ok((String::new(), EntitySource::Romanization));
        }
        debug!("Translating entity: '{}'", japanese);

        if self.store.is_connected() {
            let stored = self
                .store
                .get_entity_translation(japanese, self.use_db_cache)
                .await
                .with_context(|| format!("Entity lookup failed for '{}'", japanese))?;
            if let Some(english) = stored {
                debug!("Found in database: {} -> {}", japanese, english);
                return Ok((english, EntitySource::Database));
            }
        }

        if let Some(english) = self.lookup_knowledge_base(japanese).await {
            debug!("Found in knowledge base: {} -> {}", japanese, english);
            self.persist(japanese, &english).await;
            return Ok((english, EntitySource::KnowledgeBase));
        }

        if let Some((english, complete)) = self.apply_suffix_rule(japanese).await {
            debug!("Suffix rule applied: {} -> {}", japanese, english);
            if complete {
                self.persist(japanese, &english).await;
            }
            return Ok((english, EntitySource::SuffixRule));
        }

        let (english, complete) = self.romanizer.romanize_checked(japanese).await;
        debug!("Fallback romanization: {} -> {}", japanese, english);
        if complete {
            self.persist(japanese, &english).await;
        } else {
            warn!("Incomplete romanization of '{}' not stored", japanese);
        }
        Ok((english, EntitySource::Romanization))
    }

    async fn lookup_knowledge_base(&self, japanese: &str) -> Option<String> {
        let knowledge_base = self.knowledge_base.as_ref()?;
        match knowledge_base.lookup_english(japanese).await {
            Ok(english) => english,
            Err(e) => {
                warn!("Knowledge base lookup failed for '{}': {:#}", japanese, e);
                None
            }
        }
    }

    /// English for a name with a known suffix, and whether its base was
    /// fully romanized
    async fn apply_suffix_rule(&self, japanese: &str) -> Option<(String, bool)> {
        let (suffix, rendering) = SORTED_SUFFIXES
            .iter()
            .find(|(suffix, _)| japanese.ends_with(suffix))?;

        let base = japanese[..japanese.len() - suffix.len()].trim();
        let (roman_base, complete) = if base.is_empty() {
            (String::new(), true)
        } else {
            self.romanizer.romanize_checked(base).await
        };

        let english = match rendering {
            SuffixRendering::Toward => format!("Toward {}", roman_base).trim().to_string(),
            SuffixRendering::Attached(word) => format!("{}{}", roman_base, word),
            SuffixRendering::Spaced(word) => format!("{} {}", roman_base, word).trim().to_string(),
        };
        Some((english, complete))
    }

    /// Store a newly resolved translation; failures only cost a cache miss later.
    async fn persist(&self, japanese: &str, english: &str) {
        if !self.persist_resolved
            || !self.store.is_connected()
            || english.is_empty()
            || contains_japanese(english)
        {
            return;
        }
        if let Err(e) = self.store.add_entity(japanese, english).await {
            warn!("Failed to save entity translation {}: {:#}", japanese, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_service::TaggedToken;
    use crate::translate::romanize::{ReadingTagger, ScriptTagger};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MapKnowledgeBase(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl KnowledgeBase for MapKnowledgeBase {
        async fn lookup_english(&self, japanese: &str) -> Result<Option<String>> {
            Ok(self.0.get(japanese).map(|en| en.to_string()))
        }
    }

    struct OfflineKnowledgeBase;

    #[async_trait]
    impl KnowledgeBase for OfflineKnowledgeBase {
        async fn lookup_english(&self, _japanese: &str) -> Result<Option<String>> {
            Err(anyhow::anyhow!("connection timed out"))
        }
    }

    fn translator(
        store: Arc<DatabaseService>,
        knowledge_base: Option<Arc<dyn KnowledgeBase>>,
        persist: bool,
    ) -> EntityTranslator {
        let romanizer = Arc::new(Romanizer::new(Arc::new(ScriptTagger)));
        EntityTranslator::new(store, knowledge_base, romanizer, true, persist)
    }

    #[tokio::test]
    async fn store_wins_over_knowledge_base() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());
        store.add_entity("東京", "Tokyo").await.unwrap();
        let kb: Arc<dyn KnowledgeBase> =
            Arc::new(MapKnowledgeBase(HashMap::from([("東京", "Tokyo Metropolis")])));

        let result = translator(store, Some(kb), true).translate_entity(" 東京 ").await.unwrap();
        assert_eq!(result, ("Tokyo".to_string(), EntitySource::Database));
    }

    #[tokio::test]
    async fn knowledge_base_hit_is_written_back() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());
        let kb: Arc<dyn KnowledgeBase> = Arc::new(MapKnowledgeBase(HashMap::from([("大阪", "Osaka")])));

        let result = translator(store.clone(), Some(kb), true)
            .translate_entity("大阪")
            .await
            .unwrap();

        assert_eq!(result, ("Osaka".to_string(), EntitySource::KnowledgeBase));
        assert_eq!(
            store.get_entity_translation("大阪", true).await.unwrap().as_deref(),
            Some("Osaka")
        );
    }

    #[tokio::test]
    async fn knowledge_base_failure_falls_through_to_suffix_rule() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());
        let kb: Arc<dyn KnowledgeBase> = Arc::new(OfflineKnowledgeBase);

        let result = translator(store, Some(kb), true)
            .translate_entity("しながわ駅")
            .await
            .unwrap();
        assert_eq!(result, ("Shinagawa Station".to_string(), EntitySource::SuffixRule));
    }

    #[tokio::test]
    async fn suffix_rules_render_direction_and_train_names() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());
        let entities = translator(store, None, false);

        assert_eq!(
            entities.translate_entity("しんじゅく方面").await.unwrap().0,
            "Toward Shinjuku"
        );
        assert_eq!(
            entities.translate_entity("なりたエクスプレス").await.unwrap().0,
            "Narita Express"
        );
        assert_eq!(entities.translate_entity("のぞみ号").await.unwrap().0, "Nozomi No.");
        assert_eq!(entities.translate_entity("駅").await.unwrap().0, "Station");
    }

    #[tokio::test]
    async fn romanizes_when_nothing_else_matches() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());

        let result = translator(store.clone(), None, true)
            .translate_entity("みなとみらい")
            .await
            .unwrap();

        assert_eq!(result, ("Minatomirai".to_string(), EntitySource::Romanization));
        assert_eq!(store.cached_entity_count(), 1);
    }

    /// Fails the first call, then reads 東京 properly
    struct FlakyTagger {
        failed: AtomicBool,
    }

    #[async_trait]
    impl ReadingTagger for FlakyTagger {
        async fn tokenize(&self, text: &str) -> Result<Vec<TaggedToken>> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(anyhow::anyhow!("tokenizer offline"));
            }
            Ok(vec![TaggedToken {
                surface: text.to_string(),
                reading: Some("トウキョウ".to_string()),
            }])
        }
    }

    #[tokio::test]
    async fn degraded_romanization_is_not_stored() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());
        let tagger = Arc::new(FlakyTagger {
            failed: AtomicBool::new(false),
        });
        let romanizer = Arc::new(Romanizer::new(tagger));
        let entities = EntityTranslator::new(store.clone(), None, romanizer, true, true);

        let first = entities.translate_entity("東京").await.unwrap();
        assert_eq!(first, ("東京".to_string(), EntitySource::Romanization));
        assert_eq!(store.cached_entity_count(), 0);
        assert_eq!(store.get_entity_translation("東京", false).await.unwrap(), None);

        let second = entities.translate_entity("東京").await.unwrap();
        assert_eq!(second, ("Toukyou".to_string(), EntitySource::Romanization));
        assert_eq!(
            store.get_entity_translation("東京", true).await.unwrap().as_deref(),
            Some("Toukyou")
        );
    }

    #[tokio::test]
    async fn suffix_rule_with_unread_base_is_not_stored() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());

        let result = translator(store.clone(), None, true)
            .translate_entity("品川駅")
            .await
            .unwrap();

        assert_eq!(result, ("品川 Station".to_string(), EntitySource::SuffixRule));
        assert_eq!(store.cached_entity_count(), 0);
    }

    #[tokio::test]
    async fn write_back_can_be_disabled() {
        let store = Arc::new(DatabaseService::in_memory().unwrap());

        translator(store.clone(), None, false)
            .translate_entity("みなとみらい")
            .await
            .unwrap();
        assert_eq!(store.cached_entity_count(), 0);
    }

    #[tokio::test]
    async fn works_without_a_store() {
        let store = Arc::new(DatabaseService::disconnected());

        let result = translator(store, None, true).translate_entity("おおみや").await.unwrap();
        assert_eq!(result, ("Oomiya".to_string(), EntitySource::Romanization));
    }

    #[tokio::test]
    async fn blank_entity_is_empty() {
        let store = Arc::new(DatabaseService::disconnected());
        let result = translator(store, None, true).translate_entity("  ").await.unwrap();
        assert_eq!(result.0, "");
    }

    #[test]
    fn longest_suffix_is_tried_first() {
        let first_line_rule = SORTED_SUFFIXES
            .iter()
            .position(|(suffix, _)| *suffix == "線")
            .unwrap();
        let shinkansen = SORTED_SUFFIXES
            .iter()
            .position(|(suffix, _)| *suffix == "新幹線")
            .unwrap();
        assert!(shinkansen < first_line_rule);
    }
}
