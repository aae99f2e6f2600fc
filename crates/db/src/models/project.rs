use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Entity, ValidationError, require_non_negative, require_text};
use crate::document::Collection;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub budget: Option<f64>,
    pub manager_id: Option<String>, // Loose foreign key to User
    #[serde(default)]
    pub team_members: Vec<String>, // User ids
    pub customer_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Project {
    const COLLECTION: Collection = Collection::Projects;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "name", &self.name)?;
        if let Some(budget) = self.budget {
            require_non_negative(Self::COLLECTION, "budget", budget)?;
        }
        Ok(())
    }
}
