//! Immutable, shareable views of the document.

use std::{
    collections::HashMap,
    fmt,
    ops::Deref,
    sync::{Arc, OnceLock},
};

use db::{Collection, Document, Record};

/// One published state of the document.
///
/// Cloning is cheap and keeps identity: two clones are [`Snapshot::ptr_eq`]. A new identity
/// (and a higher revision) is only produced when the contents change.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

struct SnapshotInner {
    revision: u64,
    document: Document,
    index: OnceLock<DocumentIndex>,
}

impl Snapshot {
    pub fn new(document: Document, revision: u64) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                revision,
                document,
                index: OnceLock::new(),
            }),
        }
    }

    pub fn revision(&self) -> u64 {
        self.inner.revision
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// Foreign-key index over this snapshot, built on first use.
    pub fn index(&self) -> &DocumentIndex {
        self.inner
            .index
            .get_or_init(|| DocumentIndex::build(&self.inner.document))
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl Deref for Snapshot {
    type Target = Document;

    fn deref(&self) -> &Self::Target {
        &self.inner.document
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("revision", &self.inner.revision)
            .field("records", &self.inner.document.record_count())
            .finish()
    }
}

type Positions = HashMap<String, Vec<usize>>;

/// Record positions keyed by the foreign keys the views join on.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    /// user id -> projects where the user is manager or team member
    projects_by_user: Positions,
    by_project: HashMap<Collection, Positions>,
    by_owner: HashMap<Collection, Positions>,
}

const PROJECT_SCOPED: [Collection; 3] =
    [Collection::Tasks, Collection::Timesheets, Collection::Expenses];
const OWNED: [Collection; 2] = [Collection::Timesheets, Collection::Expenses];

impl DocumentIndex {
    pub fn build(document: &Document) -> Self {
        let mut index = Self::default();

        for (position, project) in document.collection(Collection::Projects).iter().enumerate() {
            let members = project
                .str_list("teamMembers")
                .chain(project.str_field("managerId"));
            for user_id in members {
                let positions = index.projects_by_user.entry(user_id.to_string()).or_default();
                // a manager who is also listed as a member shows up once
                if positions.last() != Some(&position) {
                    positions.push(position);
                }
            }
        }

        for collection in PROJECT_SCOPED {
            index
                .by_project
                .insert(collection, group_by(document.collection(collection), "projectId"));
        }
        for collection in OWNED {
            index
                .by_owner
                .insert(collection, group_by(document.collection(collection), "userId"));
        }

        index
    }

    /// Positions in `projects` of the projects `user_id` manages or works on, in order.
    pub fn projects_for(&self, user_id: &str) -> &[usize] {
        lookup(&self.projects_by_user, user_id)
    }

    pub fn in_project(&self, collection: Collection, project_id: &str) -> &[usize] {
        self.by_project
            .get(&collection)
            .map(|positions| lookup(positions, project_id))
            .unwrap_or_default()
    }

    pub fn owned_by(&self, collection: Collection, user_id: &str) -> &[usize] {
        self.by_owner
            .get(&collection)
            .map(|positions| lookup(positions, user_id))
            .unwrap_or_default()
    }
}

fn group_by(records: &[Record], field: &str) -> Positions {
    let mut positions = Positions::new();
    for (position, record) in records.iter().enumerate() {
        if let Some(key) = record.str_field(field) {
            positions.entry(key.to_string()).or_default().push(position);
        }
    }
    positions
}

fn lookup<'a>(positions: &'a Positions, key: &str) -> &'a [usize] {
    positions.get(key).map(Vec::as_slice).unwrap_or_default()
}
