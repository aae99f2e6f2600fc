use std::{collections::BTreeMap, sync::Arc};

use db::{Collection, DocumentStore, Record};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{
    repository::{
        Command, DataError, Outcome, Repository, RepositoryConfig, RepositoryHandle, StoreState,
    },
    snapshot::Snapshot,
    views::{self, JoinedTask, ProjectData, ScopeRule},
};

/// The surface every page works against: `loading`, `error`, `db`, the mutation functions and
/// the per-user views.
///
/// Clones share one repository writer, so a write made through any clone is visible to all of
/// them as soon as its future resolves.
#[derive(Debug, Clone)]
pub struct DataAccess {
    repository: RepositoryHandle,
}

impl DataAccess {
    pub fn new(repository: RepositoryHandle) -> Self {
        Self { repository }
    }

    /// Start a repository writer over `store` and wrap it.
    pub fn open(store: Arc<dyn DocumentStore>, config: RepositoryConfig) -> Self {
        info!(store = %store.describe(), "Opening data access");
        Self::new(Repository::spawn(store, config))
    }

    pub fn loading(&self) -> bool {
        self.repository.state().loading
    }

    pub fn error(&self) -> Option<DataError> {
        self.repository.state().error
    }

    /// The current snapshot, `None` until the first successful load.
    pub fn db(&self) -> Option<Snapshot> {
        self.repository.snapshot()
    }

    pub fn state(&self) -> StoreState {
        self.repository.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.repository.subscribe()
    }

    pub async fn wait_loaded(&self) -> Result<Snapshot, DataError> {
        self.repository.wait_loaded().await
    }

    pub async fn reload(&self) -> Result<Snapshot, DataError> {
        self.repository.reload().await
    }

    /// Replace every named collection with the given records; collections not named are left
    /// alone. Each replacement is validated in full and must carry unique ids.
    pub async fn update_db(&self, patch: BTreeMap<String, Vec<Record>>) -> Result<(), DataError> {
        let commands = replace_commands(patch)?;
        debug!(collections = commands.len(), "Replacing collections");
        self.repository.execute(commands).await?;
        Ok(())
    }

    /// [`Self::update_db`] for callers that computed `patch` from the snapshot at `revision`;
    /// refused with `StaleSnapshot` if anything was written since.
    pub async fn update_db_at(
        &self,
        revision: u64,
        patch: BTreeMap<String, Vec<Record>>,
    ) -> Result<(), DataError> {
        let commands = replace_commands(patch)?;
        debug!(collections = commands.len(), revision, "Replacing collections");
        self.repository.execute_at(revision, commands).await?;
        Ok(())
    }

    /// Append a record with a freshly generated id and `createdAt`, and return it as stored.
    pub async fn add_record(
        &self,
        collection: &str,
        mut fields: Map<String, Value>,
    ) -> Result<Record, DataError> {
        let collection = Collection::parse(collection)?;
        fields.insert(Record::ID.to_string(), Value::String(collection.new_id()));

        let outcomes = self
            .repository
            .execute(vec![Command::Insert { collection, fields }])
            .await?;
        let record = match outcomes.into_iter().next() {
            Some(Outcome::Inserted(record)) => record,
            _ => return Err(DataError::WriterStopped),
        };
        debug!(collection = %collection, id = record.id().unwrap_or_default(), "Record added");
        Ok(record)
    }

    /// Shallow-merge `patch` into the record `id`; fails with `RecordNotFound` when it is absent.
    pub async fn update_record(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Record, DataError> {
        let collection = Collection::parse(collection)?;
        let outcomes = self
            .repository
            .execute(vec![Command::Patch {
                collection,
                id: id.to_string(),
                patch,
            }])
            .await?;
        match outcomes.into_iter().next() {
            Some(Outcome::Patched(record)) => Ok(record),
            _ => Err(DataError::WriterStopped),
        }
    }

    /// Remove the record `id`. Deleting an id that does not exist succeeds and changes nothing.
    pub async fn delete_record(&self, collection: &str, id: &str) -> Result<(), DataError> {
        let collection = Collection::parse(collection)?;
        self.repository
            .execute(vec![Command::Remove {
                collection,
                id: id.to_string(),
            }])
            .await?;
        Ok(())
    }

    /// Apply all of `commands` or none of them.
    pub async fn transaction(&self, commands: Vec<Command>) -> Result<Vec<Outcome>, DataError> {
        self.repository.execute(commands).await
    }

    /// Like [`Self::transaction`], refused with `StaleSnapshot` if anything was written after
    /// the snapshot at `revision` was published.
    pub async fn transaction_at(
        &self,
        revision: u64,
        commands: Vec<Command>,
    ) -> Result<Vec<Outcome>, DataError> {
        self.repository.execute_at(revision, commands).await
    }

    pub fn get_project_data(&self, user_id: &str) -> Result<ProjectData, DataError> {
        self.project_data(user_id, ScopeRule::ProjectMembership)
    }

    /// The user's own timesheets and expenses, whichever project they were logged against.
    pub fn get_own_entries(&self, user_id: &str) -> Result<ProjectData, DataError> {
        self.project_data(user_id, ScopeRule::Owner)
    }

    pub fn project_data(&self, user_id: &str, rule: ScopeRule) -> Result<ProjectData, DataError> {
        let snapshot = self.db().ok_or(DataError::NotLoaded)?;
        Ok(views::project_data(&snapshot, user_id, rule))
    }

    /// Tasks of the user's projects with project and assignee names resolved. Dangling
    /// references read "No Project" / "Unknown".
    pub fn get_joined_tasks(&self, user_id: &str) -> Result<Vec<JoinedTask>, DataError> {
        let snapshot = self.db().ok_or(DataError::NotLoaded)?;
        let data = views::project_data(&snapshot, user_id, ScopeRule::ProjectMembership);
        Ok(views::joined_tasks(&snapshot, &data.tasks))
    }
}

fn replace_commands(patch: BTreeMap<String, Vec<Record>>) -> Result<Vec<Command>, DataError> {
    patch
        .into_iter()
        .map(|(name, records)| {
            Ok(Command::Replace {
                collection: Collection::parse(&name)?,
                records,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use db::{Document, ValidationError, store::MemoryStore};
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    async fn open(value: Value) -> (DataAccess, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_document(
            Document::from_value(value).unwrap(),
        ));
        let access = DataAccess::open(store.clone(), RepositoryConfig::default());
        access.wait_loaded().await.unwrap();
        (access, store)
    }

    #[tokio::test]
    async fn test_add_record_assigns_id_and_created_at() {
        let (access, store) = open(json!({"expenses": []})).await;

        let record = access
            .add_record(
                "expenses",
                fields(json!({
                    "userId": "u1", "amount": 100, "description": "cab",
                    "billable": true, "status": "pending"
                })),
            )
            .await
            .unwrap();

        let db = access.db().unwrap();
        let expenses = db.collection(Collection::Expenses);
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0], record);
        assert!(record.id().unwrap().starts_with("exp-"));
        assert_eq!(record.str_field("status"), Some("pending"));
        assert!(record.str_field("createdAt").is_some());
        assert_eq!(store.stored().await.unwrap(), *db.document());
    }

    #[tokio::test]
    async fn test_add_record_ignores_caller_id() {
        let (access, _) = open(json!({})).await;

        let first = access
            .add_record("customers", fields(json!({"id": "mine", "name": "A"})))
            .await
            .unwrap();
        let second = access
            .add_record("customers", fields(json!({"id": "mine", "name": "B"})))
            .await
            .unwrap();

        assert_ne!(first.id(), Some("mine"));
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_add_record_rejects_invalid_fields() {
        let (access, _) = open(json!({"expenses": []})).await;

        let result = access
            .add_record("expenses", fields(json!({"userId": "u1", "amount": 100})))
            .await;

        assert!(matches!(result, Err(DataError::Validation(_))));
        assert!(access.error().is_none());
        assert!(access.db().unwrap().collection(Collection::Expenses).is_empty());
    }

    #[tokio::test]
    async fn test_update_record_merges_shallowly() {
        let (access, _) = open(json!({
            "tasks": [{"id": "t1", "title": "Ship", "projectId": "p1", "priority": "high", "status": "new"}]
        }))
        .await;

        access
            .update_record("tasks", "t1", fields(json!({"status": "done"})))
            .await
            .unwrap();

        let db = access.db().unwrap();
        let task = db.find(Collection::Tasks, "t1").unwrap();
        assert_eq!(
            task.clone().into_value(),
            json!({"id": "t1", "title": "Ship", "projectId": "p1", "priority": "high", "status": "done"})
        );
    }

    #[tokio::test]
    async fn test_update_missing_record_fails_and_leaves_db() {
        let (access, store) = open(json!({
            "tasks": [{"id": "t1", "title": "Ship", "status": "new"}]
        }))
        .await;
        let before = access.db().unwrap();

        let result = access
            .update_record("tasks", "missing-id", fields(json!({"status": "done"})))
            .await;

        assert_eq!(
            result,
            Err(DataError::RecordNotFound {
                collection: Collection::Tasks,
                id: "missing-id".to_string()
            })
        );
        assert!(Snapshot::ptr_eq(&before, &access.db().unwrap()));
        assert!(access.error().is_none());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (access, _) = open(json!({
            "customers": [{"id": "c1", "name": "A"}, {"id": "c2", "name": "B"}]
        }))
        .await;

        access.delete_record("customers", "c1").await.unwrap();
        let once = access.db().unwrap();
        access.delete_record("customers", "c1").await.unwrap();
        let twice = access.db().unwrap();

        assert_eq!(*once.document(), *twice.document());
        assert_eq!(once.collection(Collection::Customers).len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_writes_are_all_visible() {
        let (access, _) = open(json!({})).await;

        let mut ids = Vec::new();
        for name in ["A", "B", "C"] {
            let record = access
                .add_record("vendors", fields(json!({"name": name, "services": ["ops"]})))
                .await
                .unwrap();
            ids.push(record.id().unwrap().to_string());
        }
        access
            .update_record("vendors", &ids[1], fields(json!({"name": "B2"})))
            .await
            .unwrap();
        access.delete_record("vendors", &ids[0]).await.unwrap();

        let db = access.db().unwrap();
        let names: Vec<&str> = db
            .collection(Collection::Vendors)
            .iter()
            .filter_map(|v| v.str_field("name"))
            .collect();
        assert_eq!(names, vec!["B2", "C"]);
    }

    #[tokio::test]
    async fn test_update_db_replaces_only_named_collections() {
        let (access, _) = open(json!({
            "customers": [{"id": "c1", "name": "A"}],
            "products": [{"id": "prod-1", "name": "Widget", "price": 3}],
            "settings": {"currency": "EUR"}
        }))
        .await;

        let replacement = vec![Record::from_value(json!({"id": "c9", "name": "Z"})).unwrap()];
        access
            .update_db(BTreeMap::from([("customers".to_string(), replacement.clone())]))
            .await
            .unwrap();

        let db = access.db().unwrap();
        assert_eq!(db.collection(Collection::Customers), replacement.as_slice());
        assert_eq!(db.collection(Collection::Products).len(), 1);
        assert_eq!(db.to_value()["settings"], json!({"currency": "EUR"}));
    }

    #[tokio::test]
    async fn test_update_db_rejects_unknown_collections() {
        let (access, _) = open(json!({})).await;

        let result = access
            .update_db(BTreeMap::from([("widgets".to_string(), Vec::new())]))
            .await;

        assert_eq!(
            result,
            Err(DataError::Validation(ValidationError::UnknownCollection(
                "widgets".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_store_failure_sets_error_until_next_success() {
        let (access, store) = open(json!({"customers": []})).await;

        store.fail_next_saves(1);
        let result = access
            .add_record("customers", fields(json!({"name": "A"})))
            .await;
        assert!(matches!(result, Err(DataError::StoreUnavailable(_))));
        assert!(access.error().is_some());
        assert!(access.db().unwrap().collection(Collection::Customers).is_empty());

        access.delete_record("customers", "nothing").await.unwrap();
        assert!(access.error().is_none());
    }

    #[tokio::test]
    async fn test_project_data_needs_a_loaded_document() {
        let store = Arc::new(MemoryStore::unset());
        let access = DataAccess::open(store, RepositoryConfig::default());

        assert!(access.wait_loaded().await.is_err());
        assert!(access.loading());
        assert!(access.db().is_none());
        assert_eq!(access.get_project_data("u1"), Err(DataError::NotLoaded));
    }

    #[tokio::test]
    async fn test_project_data_reads_the_latest_snapshot() {
        let (access, _) = open(json!({
            "projects": [{"id": "p1", "name": "Apollo", "teamMembers": ["u1"]}],
            "tasks": []
        }))
        .await;

        access
            .add_record("tasks", fields(json!({"title": "Kickoff", "projectId": "p1"})))
            .await
            .unwrap();

        let data = access.get_project_data("u1").unwrap();
        assert_eq!(data.projects.len(), 1);
        assert_eq!(data.tasks.len(), 1);
        assert!(access.get_own_entries("u1").unwrap().timesheets.is_empty());
    }

    #[tokio::test]
    async fn test_update_db_at_refuses_stale_revision() {
        let (access, _) = open(json!({"customers": []})).await;
        let read = access.db().unwrap();
        let replacement = BTreeMap::from([(
            "customers".to_string(),
            vec![Record::from_value(json!({"id": "c1", "name": "A"})).unwrap()],
        )]);

        access
            .add_record("customers", fields(json!({"name": "Concurrent"})))
            .await
            .unwrap();
        let stale = access.update_db_at(read.revision(), replacement.clone()).await;

        assert!(matches!(stale, Err(DataError::StaleSnapshot { .. })));
        assert_eq!(access.db().unwrap().collection(Collection::Customers).len(), 1);

        let current = access.db().unwrap().revision();
        access.update_db_at(current, replacement).await.unwrap();
        assert_eq!(
            access.db().unwrap().find(Collection::Customers, "c1").unwrap().str_field("name"),
            Some("A")
        );
    }

    #[tokio::test]
    async fn test_joined_tasks_use_placeholders() {
        let (access, _) = open(json!({
            "users": [{"id": "u1", "name": "Ada", "email": "ada@example.com", "role": "team_member"}],
            "projects": [{"id": "p1", "name": "Apollo", "teamMembers": ["u1"]}],
            "tasks": [
                {"id": "t1", "title": "Launch", "projectId": "p1", "assignedTo": "u1"},
                {"id": "t2", "title": "Review", "projectId": "p1", "assignedTo": "u-gone"}
            ]
        }))
        .await;

        let joined = access.get_joined_tasks("u1").unwrap();

        let names: Vec<(&str, &str)> = joined
            .iter()
            .map(|j| (j.project_name.as_str(), j.assignee_name.as_str()))
            .collect();
        assert_eq!(names, vec![("Apollo", "Ada"), ("Apollo", views::UNKNOWN)]);
    }
}
