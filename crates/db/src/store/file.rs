use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{DocumentStore, StoreError};
use crate::document::Document;

/// The document as one pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    create_if_missing: bool,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: false,
        }
    }

    /// Initialise an empty document when the file does not exist yet.
    /// A file that exists but cannot be read or parsed is never replaced.
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load(&self) -> Result<Document, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let document = Document::from_slice(&bytes)?;
                debug!(
                    path = %self.path.display(),
                    records = document.record_count(),
                    "Loaded document file"
                );
                Ok(document)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && self.create_if_missing => {
                info!(path = %self.path.display(), "Document file not found, initialising");
                let document = Document::new();
                self.save(&document).await?;
                Ok(document)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::Missing(self.path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        let bytes = document.to_vec_pretty()?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(format!("write task failed: {e}")))??;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}

/// Write to a temp file in the destination directory, sync, then rename over `dest`.
/// On any failure the destination is left untouched.
fn atomic_write(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    // `Path::parent` is `Some("")` for bare file names
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
