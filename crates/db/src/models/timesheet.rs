use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::{Entity, ValidationError, require_positive};
use crate::document::Collection;

pub const MAX_HOURS_PER_ENTRY: f64 = 24.0;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Timesheet {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub date: String,
    pub hours: f64,
    #[serde(default)]
    pub billable: bool,
    pub description: Option<String>,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Timesheet {
    const COLLECTION: Collection = Collection::Timesheets;

    fn check(&self) -> Result<(), ValidationError> {
        require_positive(Self::COLLECTION, "hours", self.hours)?;
        if self.hours > MAX_HOURS_PER_ENTRY {
            return Err(ValidationError::Field {
                collection: Self::COLLECTION,
                field: "hours",
                message: format!("must be at most {MAX_HOURS_PER_ENTRY}, got {}", self.hours),
            });
        }
        Ok(())
    }
}
