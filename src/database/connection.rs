use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info};

use super::schema;

/// Thread-safe SQLite connection that can be closed at shutdown.
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Option<Connection>>>,
}

impl DatabaseConnection {
    /// Open (creating if needed) the database file at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            }
        }

        info!("Opening database at: {:?}", db_path);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(Some(conn))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_open(&self) -> bool {
        self.connection
            .lock()
            .map(|conn| conn.is_some())
            .unwrap_or(false)
    }

    /// Run `f` against the connection on the blocking thread pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("Database connection is closed"))?;
            f(conn)
        })
        .await
        .context("Database task panicked")?
    }

    /// Close the connection; later operations fail
    pub fn close(&self) -> Result<()> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| anyhow::anyhow!("Failed to close database: {}", e))?;
            info!("Database connection closed: {:?}", self.db_path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executes_on_open_connection() {
        let db = DatabaseConnection::new_in_memory().unwrap();
        let one: i64 = db
            .execute_async(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn close_rejects_further_work() {
        let db = DatabaseConnection::new_in_memory().unwrap();
        assert!(db.is_open());

        db.close().unwrap();
        assert!(!db.is_open());
        assert!(db.execute_async(|_| Ok(())).await.is_err());
        // closing twice is a no-op
        db.close().unwrap();
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("entities.db");

        let db = DatabaseConnection::new(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }
}
