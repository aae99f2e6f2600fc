use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::{Entity, ValidationError, require_positive, require_text};
use crate::document::Collection;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Reimbursed,
}

impl ExpenseStatus {
    pub fn can_approve(self) -> bool {
        matches!(self, Self::Pending | Self::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Expense {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>, // Not every expense belongs to a project
    pub amount: f64,
    pub description: String,
    pub category: Option<String>,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub status: ExpenseStatus,
    pub receipt: Option<String>,
    pub approved_by: Option<String>,
    pub date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Expense {
    const COLLECTION: Collection = Collection::Expenses;

    fn check(&self) -> Result<(), ValidationError> {
        require_positive(Self::COLLECTION, "amount", self.amount)?;
        require_text(Self::COLLECTION, "description", &self.description)
    }
}
