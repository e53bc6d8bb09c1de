//! In-memory store for tests and local experiments

use super::store::{check_version, ProfileStore, RunLogSink, StoreError, StoreResult};
use crate::models::{MatchRecord, Profile, RunLogEntry};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Profiles, conversations and run logs held in process memory.
///
/// Supports write-failure injection per profile so commit failure paths can
/// be exercised.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    profiles: Arc<RwLock<BTreeMap<String, Profile>>>,
    conversations: Arc<RwLock<HashMap<String, MatchRecord>>>,
    runs: Arc<RwLock<Vec<RunLogEntry>>>,
    failing_writes: Arc<RwLock<HashSet<String>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with profiles, keeping their versions
    pub async fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        for profile in profiles {
            store.insert_profile(profile).await;
        }
        store
    }

    /// Insert or overwrite a profile without a version check or write count
    pub async fn insert_profile(&self, profile: Profile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id.clone(), profile);
    }

    /// Make every subsequent write of this profile fail
    pub async fn fail_writes_for(&self, user_id: &str) {
        self.failing_writes.write().await.insert(user_id.to_string());
    }

    /// Number of successful profile and conversation writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn profiles(&self) -> Vec<Profile> {
        self.profiles.read().await.values().cloned().collect()
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(user_id).cloned())
    }

    async fn list_profile_ids(&self) -> StoreResult<Vec<String>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.keys().cloned().collect())
    }

    async fn put_profile(&self, profile: &Profile, expected_version: u64) -> StoreResult<u64> {
        if self.failing_writes.read().await.contains(&profile.user_id) {
            return Err(StoreError::Unavailable(format!(
                "injected write failure for {}",
                profile.user_id
            )));
        }

        let mut profiles = self.profiles.write().await;
        let stored = profiles.get(&profile.user_id).map(|p| p.version);
        let next = check_version(&profile.user_id, stored, expected_version)?;

        let mut updated = profile.clone();
        updated.version = next;
        profiles.insert(updated.user_id.clone(), updated);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(next)
    }

    async fn get_conversation(&self, user_a: &str, user_b: &str) -> StoreResult<Option<MatchRecord>> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&MatchRecord::key_for(user_a, user_b)).cloned())
    }

    async fn put_conversation(&self, record: &MatchRecord) -> StoreResult<()> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(record.key(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RunLogSink for InMemoryStore {
    async fn append_run(&self, entry: &RunLogEntry) -> StoreResult<()> {
        self.runs.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_runs(&self) -> StoreResult<Vec<RunLogEntry>> {
        Ok(self.runs.read().await.clone())
    }
}
