use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::connection::DatabaseConnection;
use super::models::EntityRecord;

/// Queries against the `train_entity` table
#[derive(Clone)]
pub struct EntityRepository {
    db: DatabaseConnection,
}

impl EntityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn is_open(&self) -> bool {
        self.db.is_open()
    }

    pub fn close(&self) -> Result<()> {
        self.db.close()
    }

    /// All rows with a non-empty translation
    pub async fn load_all(&self) -> Result<Vec<EntityRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT kanji, english, created_at, updated_at FROM train_entity \
                     WHERE kanji != '' AND english != ''",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(EntityRecord {
                            kanji: row.get(0)?,
                            english: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// English translation for an exact Japanese name
    pub async fn find(&self, kanji: &str) -> Result<Option<String>> {
        let kanji = kanji.to_string();

        self.db
            .execute_async(move |conn| {
                let english: Option<String> = conn
                    .query_row(
                        "SELECT english FROM train_entity WHERE kanji = ?1 LIMIT 1",
                        [&kanji],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(english.filter(|e| !e.is_empty()))
            })
            .await
    }

    /// Rows whose Japanese or English text contains `term`
    pub async fn search(&self, term: &str, limit: u32) -> Result<Vec<EntityRecord>> {
        let pattern = format!("%{}%", escape_like(term));

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r"SELECT kanji, english, created_at, updated_at FROM train_entity
                      WHERE kanji LIKE ?1 ESCAPE '\' OR english LIKE ?1 ESCAPE '\'
                      ORDER BY kanji
                      LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![pattern, limit], |row| {
                        Ok(EntityRecord {
                            kanji: row.get(0)?,
                            english: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                debug!("Found {} entities matching pattern", rows.len());
                Ok(rows)
            })
            .await
    }

    /// Insert a translation, replacing the English text of an existing name
    pub async fn upsert(&self, kanji: &str, english: &str) -> Result<()> {
        let kanji = kanji.to_string();
        let english = english.to_string();
        let now = Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO train_entity (kanji, english, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?3)
                    ON CONFLICT(kanji) DO UPDATE SET
                        english = excluded.english,
                        updated_at = excluded.updated_at
                    "#,
                    params![kanji, english, now],
                )?;
                Ok(())
            })
            .await
    }

    /// Insert many rows in one transaction, keeping existing names
    pub async fn import(&self, entries: Vec<(String, String)>) -> Result<usize> {
        let now = Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO train_entity (kanji, english, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, ?3)",
                    )?;
                    for (kanji, english) in &entries {
                        inserted += stmt.execute(params![kanji, english, now])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
    }

    pub async fn count(&self) -> Result<usize> {
        self.db
            .execute_async(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM train_entity", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
