use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, info};

use super::{DocumentStore, StoreError};
use crate::document::Document;

const DOCUMENT_NAME: &str = "root";

/// The document as a single JSON row in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    create_if_missing: bool,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://data/app.sqlite`) and make sure the table exists.
    pub async fn connect(url: &str, create_if_missing: bool) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(create_if_missing);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::from_pool(pool, create_if_missing).await
    }

    pub async fn from_pool(pool: SqlitePool, create_if_missing: bool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS documents (
                name           TEXT PRIMARY KEY NOT NULL,
                body           TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                updated_at     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            create_if_missing,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn load(&self) -> Result<Document, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT body FROM documents WHERE name = $1")
            .bind(DOCUMENT_NAME)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((body,)) => {
                let document = Document::from_slice(body.as_bytes())?;
                debug!(records = document.record_count(), "Loaded document row");
                Ok(document)
            }
            None if self.create_if_missing => {
                info!("Document row not found, initialising");
                let document = Document::new();
                self.save(&document).await?;
                Ok(document)
            }
            None => Err(StoreError::Missing(format!("documents/{DOCUMENT_NAME}"))),
        }
    }

    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        let body = document.to_json_string()?;
        sqlx::query(
            r#"INSERT INTO documents (name, body, schema_version)
               VALUES ($1, $2, $3)
               ON CONFLICT(name) DO UPDATE SET
                   body = excluded.body,
                   schema_version = excluded.schema_version,
                   updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(DOCUMENT_NAME)
        .bind(body)
        .bind(i64::from(document.schema_version()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite table documents/{DOCUMENT_NAME}")
    }
}
