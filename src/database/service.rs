use std::collections::BTreeMap;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use super::connection::DatabaseConnection;
use super::repository::EntityRepository;
use crate::settings::{read_string_map, DatabaseConfig};

/// Entity translation store: SQLite table plus a cache of every row.
///
/// A store that failed to open stays usable in a disconnected state so the
/// API can still answer health checks and report the outage.
pub struct DatabaseService {
    repository: Option<EntityRepository>,
    entity_cache: DashMap<String, String>,
}

impl DatabaseService {
    /// Open the configured database, seed it if requested and warm the cache.
    /// Failures are logged and leave the service disconnected.
    pub async fn connect(config: &DatabaseConfig) -> Self {
        let db = match DatabaseConnection::new(&config.path) {
            Ok(db) => db,
            Err(e) => {
                error!("Error connecting to entity database: {:#}", e);
                return Self::disconnected();
            }
        };
        info!("Connected to entity database {}", config.path);

        let service = Self::with_connection(db);
        if let Some(seed_path) = &config.seed_path {
            if let Err(e) = service.seed_from_file(seed_path).await {
                warn!("Failed to seed entity database from {}: {:#}", seed_path, e);
            }
        }
        if let Err(e) = service.refresh_cache().await {
            error!("Error loading entity mapping: {:#}", e);
        }
        service
    }

    pub fn with_connection(db: DatabaseConnection) -> Self {
        Self {
            repository: Some(EntityRepository::new(db)),
            entity_cache: DashMap::new(),
        }
    }

    /// In-memory store (for testing and throwaway runs)
    pub fn in_memory() -> Result<Self> {
        Ok(Self::with_connection(DatabaseConnection::new_in_memory()?))
    }

    pub fn disconnected() -> Self {
        Self {
            repository: None,
            entity_cache: DashMap::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.repository
            .as_ref()
            .map(|repo| repo.is_open())
            .unwrap_or(false)
    }

    pub fn cached_entity_count(&self) -> usize {
        self.entity_cache.len()
    }

    pub fn cached_names(&self) -> Vec<String> {
        self.entity_cache.iter().map(|e| e.key().clone()).collect()
    }

    fn repository(&self) -> Result<&EntityRepository> {
        self.repository
            .as_ref()
            .filter(|repo| repo.is_open())
            .ok_or_else(|| anyhow::anyhow!("Database not connected"))
    }

    /// English translation for a Japanese entity, from the cache or straight
    /// from the table.
    pub async fn get_entity_translation(
        &self,
        japanese_entity: &str,
        use_cache: bool,
    ) -> Result<Option<String>> {
        if use_cache {
            return Ok(self
                .entity_cache
                .get(japanese_entity)
                .map(|e| e.value().clone()));
        }

        let english = self.repository()?.find(japanese_entity).await?;
        match &english {
            Some(en) => debug!("Found entity translation: {} -> {}", japanese_entity, en),
            None => debug!("No translation found for entity: {}", japanese_entity),
        }
        Ok(english)
    }

    /// Entities whose Japanese or English text contains `term`
    pub async fn search_entities(&self, term: &str, limit: u32) -> Result<BTreeMap<String, String>> {
        let records = self.repository()?.search(term, limit).await?;
        let results: BTreeMap<String, String> = records
            .into_iter()
            .filter(|r| !r.kanji.is_empty() && !r.english.is_empty())
            .map(|r| (r.kanji, r.english))
            .collect();

        debug!("Found {} entities matching '{}'", results.len(), term);
        Ok(results)
    }

    /// Insert or update a translation and refresh its cache entry
    pub async fn add_entity(&self, kanji: &str, english: &str) -> Result<()> {
        self.repository()?
            .upsert(kanji, english)
            .await
            .with_context(|| format!("Error adding entity '{}' -> '{}'", kanji, english))?;

        self.entity_cache.insert(kanji.to_string(), english.to_string());
        info!("Added/updated entity: {} -> {}", kanji, english);
        Ok(())
    }

    /// Reload the cache from the table
    pub async fn refresh_cache(&self) -> Result<usize> {
        let records = self.repository()?.load_all().await?;

        self.entity_cache.clear();
        for record in records {
            self.entity_cache.insert(record.kanji, record.english);
        }

        info!("Loaded {} entity mappings from database", self.entity_cache.len());
        Ok(self.entity_cache.len())
    }

    /// Import a JSON or YAML object of japanese -> english when the table is empty
    pub async fn seed_from_file(&self, path: &str) -> Result<usize> {
        let repository = self.repository()?;
        if repository.count().await? > 0 {
            debug!("Entity table already populated, skipping seed {}", path);
            return Ok(0);
        }

        let entries = read_string_map(path).context("Invalid entity seed file")?;
        let entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(ja, en)| (ja.trim().to_string(), en.trim().to_string()))
            .filter(|(ja, en)| !ja.is_empty() && !en.is_empty())
            .collect();

        let inserted = repository.import(entries).await?;
        info!("Seeded {} entities from {}", inserted, path);
        Ok(inserted)
    }

    pub fn close(&self) {
        if let Some(repository) = &self.repository {
            if let Err(e) = repository.close() {
                error!("Error closing entity database: {:#}", e);
            }
        }
    }
}
