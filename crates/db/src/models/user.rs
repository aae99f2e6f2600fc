use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::{Entity, ValidationError, require_non_negative, require_text};
use crate::document::Collection;

/// Role deciding which dashboard a user lands on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    Admin,
    ProjectManager,
    TeamMember,
    SalesFinance,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub hourly_rate: Option<f64>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "name", &self.name)?;
        if !self.email.contains('@') {
            return Err(ValidationError::Field {
                collection: Self::COLLECTION,
                field: "email",
                message: format!("is not an email address: {}", self.email),
            });
        }
        if let Some(rate) = self.hourly_rate {
            require_non_negative(Self::COLLECTION, "hourlyRate", rate)?;
        }
        Ok(())
    }
}
