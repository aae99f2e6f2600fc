use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::{Entity, ValidationError, require_text};
use crate::document::Collection;

/// Task status.
///
/// Two vocabularies are in use: the project boards write `new / in_progress / blocked /
/// done`, the admin views write `new / in_progress / completed / on_hold`. Both are valid.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    Blocked,
    Done,
    Completed,
    OnHold,
}

impl TaskStatus {
    /// `done` and `completed` both mean the work is finished
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Done | Self::Completed)
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub project_id: Option<String>, // Loose foreign key to Project
    pub assigned_to: Option<String>, // Loose foreign key to User
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub status: TaskStatus,
    pub due_date: Option<String>,
    pub estimated_hours: Option<f64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "title", &self.title)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskComment {
    pub id: String,
    pub task_id: String,
    pub author: String,
    pub body: String,
    pub created_at: Option<String>,
}

impl Entity for TaskComment {
    const COLLECTION: Collection = Collection::TaskComments;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "body", &self.body)
    }
}
