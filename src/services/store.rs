//! Storage seams used by the batch engine and the interaction operations

use crate::models::{MatchRecord, Profile, RunLogEntry};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when reading or writing stored objects
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Version conflict on profile {user_id}: expected {expected}, found {found}")]
    VersionConflict {
        user_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Read-after-write consistent access to profiles and match conversations
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get a profile by user ID
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    /// List every stored profile ID
    async fn list_profile_ids(&self) -> StoreResult<Vec<String>>;

    /// Write a profile if the stored copy is still at `expected_version`.
    ///
    /// A missing profile counts as version 0. Returns the new version.
    async fn put_profile(&self, profile: &Profile, expected_version: u64) -> StoreResult<u64>;

    /// Get the conversation between two users, in either order
    async fn get_conversation(&self, user_a: &str, user_b: &str) -> StoreResult<Option<MatchRecord>>;

    /// Create or replace a conversation
    async fn put_conversation(&self, record: &MatchRecord) -> StoreResult<()>;
}

/// Append-only sink for batch run records
#[async_trait]
pub trait RunLogSink: Send + Sync {
    async fn append_run(&self, entry: &RunLogEntry) -> StoreResult<()>;

    async fn list_runs(&self) -> StoreResult<Vec<RunLogEntry>>;
}

/// Check the compare-and-set precondition shared by every store
pub(crate) fn check_version(user_id: &str, stored: Option<u64>, expected: u64) -> StoreResult<u64> {
    let found = stored.unwrap_or(0);
    if found != expected {
        return Err(StoreError::VersionConflict {
            user_id: user_id.to_string(),
            expected,
            found,
        });
    }
    Ok(expected + 1)
}
