pub mod document;
pub mod models;
pub mod store;

pub use document::{CURRENT_SCHEMA_VERSION, Collection, Document, DocumentError, Record};
pub use models::ValidationError;
pub use store::{DocumentStore, StoreError};
