//! JSON object store on the local filesystem.
//!
//! Object layout under the root directory:
//! - `profiles/<user_id>.json`
//! - `match_chats/<user1>_<user2>.json`
//! - `matching_logs.json`

use super::store::{check_version, ProfileStore, RunLogSink, StoreError, StoreResult};
use crate::models::{MatchRecord, Profile, RunLogEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const PROFILES_DIR: &str = "profiles";
const CHATS_DIR: &str = "match_chats";
const RUN_LOG_FILE: &str = "matching_logs.json";

/// Run log document, appended to on every non-dry run
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunLogDocument {
    runs: Vec<RunLogEntry>,
    #[serde(deserialize_with = "crate::models::domain::lenient_timestamp::required")]
    created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "crate::models::domain::lenient_timestamp::optional")]
    last_run: Option<DateTime<Utc>>,
}

pub struct JsonFileStore {
    root: PathBuf,
    // Serializes read-check-write sequences within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(PROFILES_DIR)).await?;
        tokio::fs::create_dir_all(root.join(CHATS_DIR)).await?;

        tracing::debug!("Opened JSON file store at {}", root.display());

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn profile_path(&self, user_id: &str) -> StoreResult<PathBuf> {
        validate_key(user_id)?;
        Ok(self.root.join(PROFILES_DIR).join(format!("{}.json", user_id)))
    }

    fn conversation_path(&self, user_a: &str, user_b: &str) -> StoreResult<PathBuf> {
        validate_key(user_a)?;
        validate_key(user_b)?;
        Ok(self
            .root
            .join(CHATS_DIR)
            .join(format!("{}.json", MatchRecord::key_for(user_a, user_b))))
    }
}

/// Reject ids that would escape the store directory
fn validate_key(id: &str) -> StoreResult<()> {
    if id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.starts_with('.')
    {
        return Err(StoreError::InvalidKey(id.to_string()));
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write through a temp file and rename so readers never see a torn object
async fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ProfileStore for JsonFileStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        read_json(&self.profile_path(user_id)?).await
    }

    async fn list_profile_ids(&self) -> StoreResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.root.join(PROFILES_DIR)).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        // Directory order is unspecified; runs must be deterministic
        ids.sort();
        Ok(ids)
    }

    async fn put_profile(&self, profile: &Profile, expected_version: u64) -> StoreResult<u64> {
        let path = self.profile_path(&profile.user_id)?;
        let _guard = self.write_lock.lock().await;

        let stored: Option<Profile> = read_json(&path).await?;
        let next = check_version(&profile.user_id, stored.map(|p| p.version), expected_version)?;

        let mut updated = profile.clone();
        updated.version = next;
        write_json(&path, &updated).await?;

        tracing::trace!("Wrote profile {} at version {}", profile.user_id, next);
        Ok(next)
    }

    async fn get_conversation(&self, user_a: &str, user_b: &str) -> StoreResult<Option<MatchRecord>> {
        read_json(&self.conversation_path(user_a, user_b)?).await
    }

    async fn put_conversation(&self, record: &MatchRecord) -> StoreResult<()> {
        let path = self.conversation_path(&record.user1_id, &record.user2_id)?;
        let _guard = self.write_lock.lock().await;
        write_json(&path, record).await
    }
}

#[async_trait]
impl RunLogSink for JsonFileStore {
    async fn append_run(&self, entry: &RunLogEntry) -> StoreResult<()> {
        let path = self.root.join(RUN_LOG_FILE);
        let _guard = self.write_lock.lock().await;

        let mut document = read_json::<RunLogDocument>(&path).await?.unwrap_or_else(|| RunLogDocument {
            runs: Vec::new(),
            created_at: Utc::now(),
            last_run: None,
        });
        document.runs.push(entry.clone());
        document.last_run = Some(entry.timestamp);

        write_json(&path, &document).await
    }

    async fn list_runs(&self) -> StoreResult<Vec<RunLogEntry>> {
        let document: Option<RunLogDocument> = read_json(&self.root.join(RUN_LOG_FILE)).await?;
        Ok(document.map(|d| d.runs).unwrap_or_default())
    }
}
