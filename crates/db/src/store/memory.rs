use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DocumentStore, StoreError};
use crate::document::Document;

/// In-process store. Used for `BIZDESK_STORE=memory` and for exercising failure paths:
/// loads and saves can be made to fail or to stall.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<Document>>,
    failing_loads: AtomicUsize,
    failing_saves: AtomicUsize,
    delay_ms: AtomicU64,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn empty() -> Self {
        Self::with_document(Document::new())
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// No document at all: loads fail with `Missing` until something is saved.
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Delay applied before every load and save
    pub fn set_io_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis().try_into().unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> Option<Document> {
        self.document.lock().await.clone()
    }

    async fn simulate_io(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self) -> Result<Document, StoreError> {
        self.simulate_io().await;
        if take_one(&self.failing_loads) {
            return Err(StoreError::Unavailable("injected load failure".to_string()));
        }
        self.document
            .lock()
            .await
            .clone()
            .ok_or_else(|| StoreError::Missing("memory".to_string()))
    }

    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        self.simulate_io().await;
        if take_one(&self.failing_saves) {
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }
        *self.document.lock().await = Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
