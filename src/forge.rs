//! Remote forge client: configuration, trait, and GitHub implementation.
pub mod config;
pub mod github;
pub mod traits;
pub mod types;
