//! # Storage Module
//!
//! Client-side persistence: the bearer credential and the theme preference.
//! Everything else the client shows is owned by the backend and re-fetched
//! rather than stored.
//!
//! - **traits**: `CredentialStorage` and `PreferenceStorage`
//! - **file_store**: YAML file in the client data directory
//! - **memory_store**: in-memory implementation for tests and ephemeral runs

pub mod file_store;
pub mod memory_store;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::{CredentialStorage, PreferenceStorage};
