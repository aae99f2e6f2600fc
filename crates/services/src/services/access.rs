//! Role gate for pages that depend on loaded data.
//!
//! Authentication happens elsewhere; this only decides, for an already known user, whether a
//! page may render. The decision is deferred while the document is still loading so that a
//! transient unloaded state never bounces a user to another dashboard.

use db::models::user::UserRole;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::repository::StoreState;

/// The authenticated user as supplied by the auth layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
pub struct SessionUser {
    pub id: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, TS)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    /// Data is still loading; decide later
    Pending,
    Allowed,
    /// Send the user to the home page of their own role
    Redirect { to: String },
}

/// Home page per role.
pub fn dashboard_for(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "/admin",
        UserRole::ProjectManager => "/project-manager",
        UserRole::TeamMember => "/team-member",
        UserRole::SalesFinance => "/sales-finance",
    }
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    allowed: Vec<UserRole>,
}

impl AccessGate {
    pub fn new(allowed: impl IntoIterator<Item = UserRole>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn check(&self, state: &StoreState, user: &SessionUser) -> AccessDecision {
        if state.loading {
            return AccessDecision::Pending;
        }
        if self.allowed.contains(&user.role) {
            AccessDecision::Allowed
        } else {
            AccessDecision::Redirect {
                to: dashboard_for(user.role).to_string(),
            }
        }
    }
}
