use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Entity, ValidationError, require_text};
use crate::document::Collection;

/// Workflow definitions are stored and displayed only; nothing executes them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    pub trigger: Option<String>,
    pub status: Option<String>,
    pub executions: Option<u64>,
    pub success_rate: Option<f64>,
    pub last_run: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Workflow {
    const COLLECTION: Collection = Collection::Workflows;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "name", &self.name)
    }
}
