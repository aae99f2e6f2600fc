pub mod config;
pub mod error;
pub mod routes;

use services::services::hook::DataAccess;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub access: DataAccess,
}

impl AppState {
    pub fn new(access: DataAccess) -> Self {
        Self { access }
    }
}
