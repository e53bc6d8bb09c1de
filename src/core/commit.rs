use crate::models::{MatchRecord, Profile};
use crate::services::{ProfileStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Why a pairing could not be committed
#[derive(Debug, Error)]
pub enum CommitError {
    /// Nothing was written; the pairing is abandoned
    #[error("failed to write profile {user_id}: {source}")]
    FirstWrite {
        user_id: String,
        #[source]
        source: StoreError,
    },

    /// The first profile points at its partner but the partner was not updated
    #[error("half match: {written_id} was updated but {failed_id} was not: {source}")]
    HalfMatch {
        written_id: String,
        failed_id: String,
        #[source]
        source: StoreError,
    },
}

/// What a successful commit produced
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Set when the conversation record could not be written
    pub conversation_warning: Option<String>,
}

/// Writes a pairing's effects: profile A, then profile B, then the
/// conversation record. Each profile write is a compare-and-set on the
/// version carried by the snapshot passed in.
#[derive(Clone)]
pub struct MatchStateUpdater {
    store: Arc<dyn ProfileStore>,
}

impl MatchStateUpdater {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub async fn commit(
        &self,
        a: &Profile,
        b: &Profile,
        score: u8,
        reasoning: &str,
    ) -> Result<CommitOutcome, CommitError> {
        let matched_at = Utc::now();

        let mut updated_a = a.clone();
        updated_a.assign_match(&b.user_id, score, matched_at);
        self.store
            .put_profile(&updated_a, a.version)
            .await
            .map_err(|source| CommitError::FirstWrite {
                user_id: a.user_id.clone(),
                source,
            })?;

        let mut updated_b = b.clone();
        updated_b.assign_match(&a.user_id, score, matched_at);
        if let Err(source) = self.store.put_profile(&updated_b, b.version).await {
            tracing::error!(
                "Half match: {} now points at {} but {} could not be updated: {}",
                a.user_id,
                b.user_id,
                b.user_id,
                source
            );
            return Err(CommitError::HalfMatch {
                written_id: a.user_id.clone(),
                failed_id: b.user_id.clone(),
                source,
            });
        }

        let record = MatchRecord::new(&a.user_id, &b.user_id, score, reasoning);
        let conversation_warning = match self.store.put_conversation(&record).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Match {} stands without a conversation record: {}", record.key(), e);
                Some(format!("conversation {} not created: {}", record.key(), e))
            }
        };

        tracing::info!("Matched {} with {} (score {})", a.user_id, b.user_id, score);

        Ok(CommitOutcome { conversation_warning })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryStore;

    async fn setup() -> (InMemoryStore, Profile, Profile) {
        let a = Profile::new("a", Some(30), Some("male"));
        let b = Profile::new("b", Some(29), Some("female"));
        let store = InMemoryStore::with_profiles(vec![a.clone(), b.clone()]).await;
        (store, a, b)
    }

    #[tokio::test]
    async fn test_commit_updates_both_and_creates_conversation() {
        let (store, a, b) = setup().await;
        let updater = MatchStateUpdater::new(Arc::new(store.clone()));

        let outcome = updater.commit(&a, &b, 77, "good fit").await.unwrap();
        assert!(outcome.conversation_warning.is_none());

        let stored_a = store.get_profile("a").await.unwrap().unwrap();
        let stored_b = store.get_profile("b").await.unwrap().unwrap();
        assert_eq!(stored_a.current_match_id.as_deref(), Some("b"));
        assert_eq!(stored_b.current_match_id.as_deref(), Some("a"));
        assert_eq!(stored_a.match_score, Some(77));
        assert!(!stored_b.match_accepted);
        assert_eq!(stored_a.version, 1);
        assert!(stored_a.matched_at.is_some());
        assert_eq!(stored_a.matched_at, stored_b.matched_at);

        let record = store.get_conversation("b", "a").await.unwrap().unwrap();
        assert!(record.messages.is_empty());
        assert_eq!(record.reasoning.as_deref(), Some("good fit"));
    }

    #[tokio::test]
    async fn test_stale_snapshot_abandons_pairing() {
        let (store, a, b) = setup().await;
        // Someone else touched A after the snapshot was taken
        store.put_profile(&a, 0).await.unwrap();
        let updater = MatchStateUpdater::new(Arc::new(store.clone()));

        let result = updater.commit(&a, &b, 60, "").await;

        assert!(matches!(
            result,
            Err(CommitError::FirstWrite { source: StoreError::VersionConflict { .. }, .. })
        ));
        let stored_b = store.get_profile("b").await.unwrap().unwrap();
        assert!(!stored_b.is_matched());
    }

    #[tokio::test]
    async fn test_second_write_failure_is_half_match() {
        let (store, a, b) = setup().await;
        store.fail_writes_for("b").await;
        let updater = MatchStateUpdater::new(Arc::new(store.clone()));

        let result = updater.commit(&a, &b, 60, "").await;

        match result {
            Err(CommitError::HalfMatch { written_id, failed_id, .. }) => {
                assert_eq!(written_id, "a");
                assert_eq!(failed_id, "b");
            }
            other => panic!("expected half match, got {:?}", other),
        }
        assert_eq!(store.conversation_count().await, 0);
    }
}
