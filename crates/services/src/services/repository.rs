//! Single-writer repository over the application document.
//!
//! One background task owns the current document. Every mutation is a batch of
//! [`Command`]s sent over a queue and applied in arrival order against the writer's
//! latest state, then saved, then published. Two callers can therefore never compute
//! their change from the same stale copy and silently drop each other's writes.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::Utc;
use db::{Collection, Document, DocumentStore, Record, StoreError, ValidationError, models};
use serde_json::{Map, Value};
use strum_macros::Display;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, error, info, warn};

use super::snapshot::Snapshot;

pub const CREATED_AT: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreOperation {
    Load,
    Save,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// A timed-out save is not abandoned: it may still land, and the writer publishes
    /// whatever it left on disk before accepting the next request.
    #[error("store {operation} timed out after {timeout:?}")]
    Timeout {
        operation: StoreOperation,
        timeout: Duration,
    },
    #[error("{collection} record {id} not found")]
    RecordNotFound { collection: Collection, id: String },
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("snapshot revision {expected} is stale, current revision is {current}")]
    StaleSnapshot { expected: u64, current: u64 },
    #[error("data has not been loaded")]
    NotLoaded,
    #[error("repository writer has stopped")]
    WriterStopped,
}

impl DataError {
    /// Failures of the backing store, as opposed to a rejected request.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Timeout { .. })
    }
}

impl From<StoreError> for DataError {
    fn from(e: StoreError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

/// A single typed change to one collection
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Append a record. A non-empty `id` in `fields` is kept, otherwise one is generated.
    Insert {
        collection: Collection,
        fields: Map<String, Value>,
    },
    /// Shallow-merge `patch` into the record with `id`.
    Patch {
        collection: Collection,
        id: String,
        patch: Map<String, Value>,
    },
    /// Remove the record with `id`; removing a missing id changes nothing.
    Remove { collection: Collection, id: String },
    /// Replace the whole collection.
    Replace {
        collection: Collection,
        records: Vec<Record>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Inserted(Record),
    Patched(Record),
    Removed { existed: bool },
    Replaced { count: usize },
}

/// What consumers observe: the loading flag, the last store error and the current snapshot.
#[derive(Debug, Clone)]
pub struct StoreState {
    /// True until the first successful load
    pub loading: bool,
    pub error: Option<DataError>,
    /// `None` until loaded; never replaced by an empty document on failure
    pub db: Option<Snapshot>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            db: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Deadline for every load and save
    pub io_timeout: Duration,
    /// Mutations waiting beyond this many block their callers
    pub queue_depth: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(5),
            queue_depth: 256,
        }
    }
}

enum Request {
    Apply {
        commands: Vec<Command>,
        expected_revision: Option<u64>,
        reply: oneshot::Sender<Result<Vec<Outcome>, DataError>>,
    },
    Reload {
        reply: oneshot::Sender<Result<Snapshot, DataError>>,
    },
}

/// A save that outlived the I/O timeout and is still running
struct PendingSave {
    document: Document,
    task: JoinHandle<Result<(), StoreError>>,
}

pub struct Repository {
    store: Arc<dyn DocumentStore>,
    config: RepositoryConfig,
    state: watch::Sender<StoreState>,
    current: Option<Snapshot>,
    revision: u64,
    pending: Option<PendingSave>,
}

impl Repository {
    /// Spawn the writer task. It performs the initial load, then serves mutations until
    /// every handle has been dropped.
    pub fn spawn(store: Arc<dyn DocumentStore>, config: RepositoryConfig) -> RepositoryHandle {
        let (requests, receiver) = mpsc::channel(config.queue_depth.max(1));
        let (state, state_rx) = watch::channel(StoreState::default());

        let repository = Self {
            store,
            config,
            state,
            current: None,
            revision: 0,
            pending: None,
        };
        tokio::spawn(async move {
            repository.run(receiver).await;
        });

        RepositoryHandle {
            requests,
            state: state_rx,
        }
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<Request>) {
        info!(
            store = %self.store.describe(),
            io_timeout = ?self.config.io_timeout,
            "Starting repository writer"
        );

        if let Err(e) = self.load().await {
            error!(error = %e, "Initial document load failed");
        }

        while let Some(request) = receiver.recv().await {
            match request {
                Request::Apply {
                    commands,
                    expected_revision,
                    reply,
                } => {
                    let result = self.apply(commands, expected_revision).await;
                    self.record_result(result.as_ref().map(|_| ()));
                    // the caller may have gone away; the write stands either way
                    let _ = reply.send(result);
                }
                Request::Reload { reply } => {
                    let result = match self.settle_pending().await {
                        Ok(()) => self.load().await,
                        Err(e) => {
                            self.record_result(Err(&e));
                            Err(e)
                        }
                    };
                    let _ = reply.send(result);
                }
            }
        }

        debug!("All repository handles dropped, writer stopping");
    }

    async fn load(&mut self) -> Result<Snapshot, DataError> {
        let loaded = timeout(self.config.io_timeout, self.store.load())
            .await
            .map_err(|_| DataError::Timeout {
                operation: StoreOperation::Load,
                timeout: self.config.io_timeout,
            })
            .and_then(|result| result.map_err(DataError::from));

        match loaded {
            Ok(document) => {
                if let Some(current) = &self.current
                    && *current.document() == document
                {
                    debug!(revision = current.revision(), "Reloaded document is unchanged");
                    let current = current.clone();
                    self.state.send_modify(|state| state.error = None);
                    return Ok(current);
                }

                let snapshot = self.next_snapshot(document);
                info!(
                    revision = snapshot.revision(),
                    records = snapshot.record_count(),
                    "Document loaded"
                );
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = None;
                    state.db = Some(snapshot.clone());
                });
                Ok(snapshot)
            }
            Err(e) => {
                // a failed reload keeps serving the document this writer already owns
                warn!(error = %e, loaded = self.current.is_some(), "Document load failed");
                self.state.send_modify(|state| state.error = Some(e.clone()));
                Err(e)
            }
        }
    }

    async fn apply(
        &mut self,
        commands: Vec<Command>,
        expected_revision: Option<u64>,
    ) -> Result<Vec<Outcome>, DataError> {
        // nothing is applied on top of a document whose last save has an unknown outcome
        self.settle_pending().await?;
        let current = self.current.clone().ok_or(DataError::NotLoaded)?;
        if let Some(expected) = expected_revision
            && expected != current.revision()
        {
            return Err(DataError::StaleSnapshot {
                expected,
                current: current.revision(),
            });
        }

        // all commands land on a working copy; any failure discards the whole batch
        let mut working = current.document().clone();
        let now = Utc::now().to_rfc3339();
        let outcomes = commands
            .into_iter()
            .map(|command| apply_command(&mut working, command, &now))
            .collect::<Result<Vec<_>, _>>()?;

        if working == *current.document() {
            debug!(revision = current.revision(), "Mutation changed nothing, not saving");
            return Ok(outcomes);
        }

        let store = Arc::clone(&self.store);
        let saving = working.clone();
        let mut task = tokio::spawn(async move { store.save(&saving).await });
        match timeout(self.config.io_timeout, &mut task).await {
            Ok(joined) => joined.map_err(|e| {
                DataError::StoreUnavailable(format!("save task failed: {e}"))
            })??,
            Err(_) => {
                warn!(
                    timeout = ?self.config.io_timeout,
                    "Save timed out, holding further writes until it settles"
                );
                self.pending = Some(PendingSave {
                    document: working,
                    task,
                });
                return Err(DataError::Timeout {
                    operation: StoreOperation::Save,
                    timeout: self.config.io_timeout,
                });
            }
        }

        let snapshot = self.next_snapshot(working);
        debug!(
            revision = snapshot.revision(),
            outcomes = outcomes.len(),
            "Mutation saved"
        );
        self.state
            .send_modify(|state| state.db = Some(snapshot.clone()));
        Ok(outcomes)
    }

    /// Wait, at most one I/O timeout, for a save that previously timed out. If it landed,
    /// its document becomes the published snapshot, so memory never disagrees with the store.
    async fn settle_pending(&mut self) -> Result<(), DataError> {
        let io_timeout = self.config.io_timeout;
        let Some(pending) = self.pending.as_mut() else {
            return Ok(());
        };
        let Ok(joined) = timeout(io_timeout, &mut pending.task).await else {
            return Err(DataError::Timeout {
                operation: StoreOperation::Save,
                timeout: io_timeout,
            });
        };
        let Some(PendingSave { document, .. }) = self.pending.take() else {
            return Ok(());
        };

        match joined {
            Ok(Ok(())) => {
                let snapshot = self.next_snapshot(document);
                warn!(
                    revision = snapshot.revision(),
                    "Timed-out save completed, publishing what was written"
                );
                self.state
                    .send_modify(|state| state.db = Some(snapshot.clone()));
            }
            Ok(Err(e)) => warn!(error = %e, "Timed-out save failed, document unchanged"),
            Err(e) => warn!(error = %e, "Timed-out save task did not finish"),
        }
        Ok(())
    }

    fn record_result(&self, result: Result<(), &DataError>) {
        match result {
            Ok(()) => self.state.send_if_modified(|state| state.error.take().is_some()),
            Err(e) if e.is_store_failure() => {
                error!(error = %e, "Mutation failed in the backing store");
                self.state.send_modify(|state| state.error = Some(e.clone()));
                true
            }
            Err(e) => {
                debug!(error = %e, "Mutation rejected");
                false
            }
        };
    }

    fn next_snapshot(&mut self, document: Document) -> Snapshot {
        self.revision += 1;
        let snapshot = Snapshot::new(document, self.revision);
        self.current = Some(snapshot.clone());
        snapshot
    }
}

fn apply_command(document: &mut Document, command: Command, now: &str) -> Result<Outcome, DataError> {
    match command {
        Command::Insert { collection, fields } => {
            let mut record = Record::new(fields);
            let id = match record.id() {
                Some(id) => {
                    if document.position(collection, id).is_some() {
                        return Err(ValidationError::DuplicateId {
                            collection,
                            id: id.to_string(),
                        }
                        .into());
                    }
                    id.to_string()
                }
                None => collection.new_id(),
            };
            record.set(Record::ID, Value::String(id));
            if record.get(CREATED_AT).is_none() {
                record.set(CREATED_AT, Value::String(now.to_string()));
            }
            models::validate_record(collection, &record)?;
            document.collection_mut(collection).push(record.clone());
            Ok(Outcome::Inserted(record))
        }
        Command::Patch {
            collection,
            id,
            patch,
        } => {
            let position = document
                .position(collection, &id)
                .ok_or_else(|| DataError::RecordNotFound {
                    collection,
                    id: id.clone(),
                })?;
            if let Some(new_id) = patch.get(Record::ID)
                && new_id.as_str() != Some(id.as_str())
            {
                return Err(ValidationError::IdChange { collection, id }.into());
            }
            let records = document.collection_mut(collection);
            let mut record = records[position].clone();
            record.merge(&patch);
            models::validate_record(collection, &record)?;
            records[position] = record.clone();
            Ok(Outcome::Patched(record))
        }
        Command::Remove { collection, id } => {
            if !document.has_collection(collection) {
                return Ok(Outcome::Removed { existed: false });
            }
            let records = document.collection_mut(collection);
            let before = records.len();
            records.retain(|record| record.id() != Some(id.as_str()));
            Ok(Outcome::Removed {
                existed: records.len() != before,
            })
        }
        Command::Replace {
            collection,
            records,
        } => {
            let mut seen = HashSet::new();
            for record in &records {
                models::validate_record(collection, record)?;
                if let Some(id) = record.id()
                    && !seen.insert(id)
                {
                    return Err(ValidationError::DuplicateId {
                        collection,
                        id: id.to_string(),
                    }
                    .into());
                }
            }
            let count = records.len();
            document.replace_collection(collection, records);
            Ok(Outcome::Replaced { count })
        }
    }
}

/// Cheap, cloneable access to the repository writer.
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<StoreState>,
}

impl RepositoryHandle {
    pub fn state(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.state.borrow().db.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.clone()
    }

    /// Resolves with the first loaded snapshot, or with the load error.
    pub async fn wait_loaded(&self) -> Result<Snapshot, DataError> {
        let mut state = self.state.clone();
        let state = state
            .wait_for(|state| state.db.is_some() || state.error.is_some())
            .await
            .map_err(|_| DataError::WriterStopped)?;
        match (&state.db, &state.error) {
            (Some(db), _) => Ok(db.clone()),
            (None, Some(e)) => Err(e.clone()),
            (None, None) => Err(DataError::NotLoaded),
        }
    }

    /// Apply `commands` as one all-or-nothing batch.
    pub async fn execute(&self, commands: Vec<Command>) -> Result<Vec<Outcome>, DataError> {
        self.send_apply(commands, None).await
    }

    /// Like [`Self::execute`], but refuses to run unless the current snapshot is still
    /// `revision`. For callers that computed their commands from a snapshot they read.
    pub async fn execute_at(
        &self,
        revision: u64,
        commands: Vec<Command>,
    ) -> Result<Vec<Outcome>, DataError> {
        self.send_apply(commands, Some(revision)).await
    }

    /// Load the document again; the caller's retry after a failed load.
    pub async fn reload(&self) -> Result<Snapshot, DataError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Reload { reply })
            .await
            .map_err(|_| DataError::WriterStopped)?;
        response.await.map_err(|_| DataError::WriterStopped)?
    }

    async fn send_apply(
        &self,
        commands: Vec<Command>,
        expected_revision: Option<u64>,
    ) -> Result<Vec<Outcome>, DataError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Apply {
                commands,
                expected_revision,
                reply,
            })
            .await
            .map_err(|_| DataError::WriterStopped)?;
        response.await.map_err(|_| DataError::WriterStopped)?
    }
}

#[cfg(test)]
mod tests {
    use db::store::MemoryStore;
    use serde_json::json;

    use super::*;

    fn document(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn expense(description: &str) -> Command {
        Command::Insert {
            collection: Collection::Expenses,
            fields: fields(json!({
                "userId": "u1", "amount": 100, "description": description,
                "billable": true, "status": "pending"
            })),
        }
    }

    async fn open(store: Arc<MemoryStore>) -> RepositoryHandle {
        let handle = Repository::spawn(store, RepositoryConfig::default());
        handle.wait_loaded().await.unwrap();
        handle
    }

    #[tokio::test]
    async fn test_initial_state_is_loading_then_loaded() {
        let store = Arc::new(MemoryStore::with_document(document(json!({"tasks": []}))));
        let handle = Repository::spawn(store, RepositoryConfig::default());

        let snapshot = handle.wait_loaded().await.unwrap();
        let state = handle.state();

        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(Snapshot::ptr_eq(state.db.as_ref().unwrap(), &snapshot));
        assert_eq!(snapshot.revision(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_both_kept() {
        let store = Arc::new(MemoryStore::with_document(document(json!({"expenses": []}))));
        let handle = open(store.clone()).await;
        let before = handle.snapshot().unwrap();

        let (a, b) = tokio::join!(
            handle.execute(vec![expense("cab")]),
            handle.execute(vec![expense("train")])
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(before.collection(Collection::Expenses).len(), 0);
        let after = handle.snapshot().unwrap();
        assert_eq!(after.collection(Collection::Expenses).len(), 2);
        let stored = store.stored().await.unwrap();
        assert_eq!(stored.collection(Collection::Expenses).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_snapshot_and_sets_error() {
        let store = Arc::new(MemoryStore::with_document(document(json!({"expenses": []}))));
        let handle = open(store.clone()).await;
        let before = handle.snapshot().unwrap();

        store.fail_next_saves(1);
        let result = handle.execute(vec![expense("cab")]).await;

        assert!(matches!(result, Err(DataError::StoreUnavailable(_))));
        let state = handle.state();
        assert!(Snapshot::ptr_eq(state.db.as_ref().unwrap(), &before));
        assert!(matches!(state.error, Some(DataError::StoreUnavailable(_))));

        handle.execute(vec![expense("cab")]).await.unwrap();
        let state = handle.state();
        assert!(state.error.is_none());
        assert_eq!(state.db.unwrap().collection(Collection::Expenses).len(), 1);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = Arc::new(MemoryStore::with_document(document(json!({
            "tasks": [{"id": "t1", "title": "Ship", "projectId": "p1", "status": "new"}]
        }))));
        let handle = open(store.clone()).await;

        let result = handle
            .execute(vec![
                expense("cab"),
                Command::Patch {
                    collection: Collection::Tasks,
                    id: "missing".to_string(),
                    patch: fields(json!({"status": "done"})),
                },
            ])
            .await;

        assert!(matches!(result, Err(DataError::RecordNotFound { .. })));
        assert!(handle.snapshot().unwrap().collection(Collection::Expenses).is_empty());
        assert_eq!(store.save_count(), 0);
        // a rejected request is the caller's business, not a store error
        assert!(handle.state().error.is_none());
    }

    #[tokio::test]
    async fn test_stale_revision_is_refused() {
        let store = Arc::new(MemoryStore::empty());
        let handle = open(store).await;
        let read = handle.snapshot().unwrap();

        handle.execute(vec![expense("first")]).await.unwrap();
        let result = handle.execute_at(read.revision(), vec![expense("second")]).await;

        assert_eq!(
            result,
            Err(DataError::StaleSnapshot {
                expected: read.revision(),
                current: read.revision() + 1
            })
        );
        let current = handle.snapshot().unwrap();
        handle
            .execute_at(current.revision(), vec![expense("second")])
            .await
            .unwrap();
        assert_eq!(handle.snapshot().unwrap().collection(Collection::Expenses).len(), 2);
    }

    #[tokio::test]
    async fn test_noop_keeps_snapshot_identity() {
        let store = Arc::new(MemoryStore::with_document(document(json!({"tasks": []}))));
        let handle = open(store.clone()).await;
        let before = handle.snapshot().unwrap();

        let outcomes = handle
            .execute(vec![Command::Remove {
                collection: Collection::Tasks,
                id: "nope".to_string(),
            }])
            .await
            .unwrap();

        assert_eq!(outcomes, vec![Outcome::Removed { existed: false }]);
        assert!(Snapshot::ptr_eq(&before, &handle.snapshot().unwrap()));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_insert_keeps_given_id_and_rejects_duplicates() {
        let store = Arc::new(MemoryStore::empty());
        let handle = open(store).await;
        let insert = Command::Insert {
            collection: Collection::Customers,
            fields: fields(json!({"id": "cust-1", "name": "Initech"})),
        };

        let outcomes = handle.execute(vec![insert.clone()]).await.unwrap();
        let Outcome::Inserted(record) = &outcomes[0] else {
            panic!("expected an insert outcome");
        };
        assert_eq!(record.id(), Some("cust-1"));
        assert!(record.str_field(CREATED_AT).is_some());

        assert_eq!(
            handle.execute(vec![insert]).await,
            Err(DataError::Validation(ValidationError::DuplicateId {
                collection: Collection::Customers,
                id: "cust-1".to_string()
            }))
        );
    }

    #[tokio::test]
    async fn test_patch_cannot_change_id() {
        let store = Arc::new(MemoryStore::with_document(document(json!({
            "customers": [{"id": "c1", "name": "Initech"}]
        }))));
        let handle = open(store).await;

        let result = handle
            .execute(vec![Command::Patch {
                collection: Collection::Customers,
                id: "c1".to_string(),
                patch: fields(json!({"id": "c2"})),
            }])
            .await;

        assert!(matches!(
            result,
            Err(DataError::Validation(ValidationError::IdChange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_replace_rejects_duplicate_ids() {
        let store = Arc::new(MemoryStore::empty());
        let handle = open(store).await;
        let records = vec![
            Record::from_value(json!({"id": "c1", "name": "A"})).unwrap(),
            Record::from_value(json!({"id": "c1", "name": "B"})).unwrap(),
        ];

        let result = handle
            .execute(vec![Command::Replace {
                collection: Collection::Customers,
                records,
            }])
            .await;

        assert!(matches!(
            result,
            Err(DataError::Validation(ValidationError::DuplicateId { .. }))
        ));
    }

    #[tokio::test]
    async fn test_load_failure_withholds_data_until_reload() {
        let store = Arc::new(MemoryStore::with_document(document(json!({
            "users": [{"id": "u1", "name": "Ada", "email": "ada@example.com", "role": "admin"}]
        }))));
        store.fail_next_loads(1);
        let handle = Repository::spawn(store, RepositoryConfig::default());

        let result = handle.wait_loaded().await;
        assert!(matches!(result, Err(DataError::StoreUnavailable(_))));
        let state = handle.state();
        assert!(state.loading);
        assert!(state.db.is_none());
        assert_eq!(
            handle.execute(vec![expense("cab")]).await,
            Err(DataError::NotLoaded)
        );

        let snapshot = handle.reload().await.unwrap();
        assert_eq!(snapshot.collection(Collection::Users).len(), 1);
        let state = handle.state();
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_unchanged_reload_keeps_identity() {
        let store = Arc::new(MemoryStore::empty());
        let handle = open(store).await;
        let before = handle.snapshot().unwrap();

        let reloaded = handle.reload().await.unwrap();

        assert!(Snapshot::ptr_eq(&before, &reloaded));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = Arc::new(MemoryStore::empty());
        store.set_io_delay(Duration::from_millis(500));
        let handle = Repository::spawn(
            store,
            RepositoryConfig {
                io_timeout: Duration::from_millis(20),
                ..RepositoryConfig::default()
            },
        );

        assert_eq!(
            handle.wait_loaded().await.err(),
            Some(DataError::Timeout {
                operation: StoreOperation::Load,
                timeout: Duration::from_millis(20)
            })
        );
        assert!(handle.state().loading);
    }

    fn customer(name: &str) -> Command {
        Command::Insert {
            collection: Collection::Customers,
            fields: fields(json!({"name": name})),
        }
    }

    #[tokio::test]
    async fn test_timed_out_save_is_settled_before_next_write() {
        let store = Arc::new(MemoryStore::empty());
        let handle = Repository::spawn(
            store.clone(),
            RepositoryConfig {
                io_timeout: Duration::from_millis(20),
                ..RepositoryConfig::default()
            },
        );
        handle.wait_loaded().await.unwrap();
        let before = handle.snapshot().unwrap();

        store.set_io_delay(Duration::from_millis(300));
        let slow = handle.execute(vec![customer("Initech")]).await;
        assert!(matches!(
            slow,
            Err(DataError::Timeout {
                operation: StoreOperation::Save,
                ..
            })
        ));
        assert!(Snapshot::ptr_eq(&before, &handle.snapshot().unwrap()));

        // still in flight: nothing may be applied on top of it
        let blocked = handle.execute(vec![customer("Globex")]).await;
        assert!(matches!(blocked, Err(DataError::Timeout { .. })));
        assert!(handle.state().error.is_some());

        store.set_io_delay(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(400)).await;
        handle.execute(vec![customer("Umbrella")]).await.unwrap();

        let names = |document: &Document| -> Vec<String> {
            document
                .collection(Collection::Customers)
                .iter()
                .filter_map(|c| c.str_field("name").map(str::to_string))
                .collect()
        };
        let published = handle.snapshot().unwrap();
        assert_eq!(names(published.document()), vec!["Initech", "Umbrella"]);
        assert_eq!(names(&store.stored().await.unwrap()), names(published.document()));
        assert!(handle.state().error.is_none());
    }

    #[tokio::test]
    async fn test_timed_out_save_that_fails_leaves_document() {
        let store = Arc::new(MemoryStore::empty());
        let handle = Repository::spawn(
            store.clone(),
            RepositoryConfig {
                io_timeout: Duration::from_millis(20),
                ..RepositoryConfig::default()
            },
        );
        handle.wait_loaded().await.unwrap();

        store.set_io_delay(Duration::from_millis(100));
        store.fail_next_saves(1);
        assert!(handle.execute(vec![customer("Initech")]).await.is_err());

        store.set_io_delay(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let reloaded = handle.reload().await.unwrap();

        assert!(reloaded.collection(Collection::Customers).is_empty());
        assert_eq!(store.save_count(), 0);
    }
}
