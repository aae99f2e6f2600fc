pub mod access;
pub mod billing;
pub mod hook;
pub mod repository;
pub mod snapshot;
pub mod views;
