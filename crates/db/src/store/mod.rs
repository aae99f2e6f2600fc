//! Durable load/save of the root document.
//!
//! Every save writes the whole document. That is fine for the small datasets this
//! application holds and is the first thing to replace if a collection grows large.

mod file;
mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::document::{Document, DocumentError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
    #[error("no document found at {0}")]
    Missing(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Backing store for the application document
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the full document. Failing here must never be read as "no data".
    async fn load(&self) -> Result<Document, StoreError>;

    /// Persist the full document. Returns only once the write is durable.
    async fn save(&self, document: &Document) -> Result<(), StoreError>;

    /// Human readable location, for logs
    fn describe(&self) -> String;
}
