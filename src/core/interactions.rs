//! Operations the interactive layer performs on a profile's match.
//!
//! They mutate the same fields as the batch engine and go through the same
//! version-checked writes, so a handler racing a batch run loses cleanly
//! with a `VersionConflict` instead of overwriting it.

use crate::models::{ChatMessage, MatchRecord, Profile};
use crate::services::{ProfileStore, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Profile {0} has no current match")]
    NoCurrentMatch(String),

    #[error("Message content is empty")]
    EmptyMessage,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// A profile's view of its current pairing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentMatch {
    pub partner_id: String,
    pub score: Option<u8>,
    pub matched_at: Option<DateTime<Utc>>,
    pub accepted: bool,
}

#[derive(Clone)]
pub struct MatchInteractions {
    store: Arc<dyn ProfileStore>,
}

impl MatchInteractions {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    async fn load(&self, user_id: &str) -> Result<Profile, InteractionError> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| InteractionError::NotFound(user_id.to_string()))
    }

    async fn save(&self, profile: &Profile) -> Result<(), InteractionError> {
        self.store.put_profile(profile, profile.version).await?;
        Ok(())
    }

    /// Profile that is matched, or `NoCurrentMatch`
    async fn load_matched(&self, user_id: &str) -> Result<(Profile, String), InteractionError> {
        let profile = self.load(user_id).await?;
        let partner_id = profile
            .current_match_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| InteractionError::NoCurrentMatch(user_id.to_string()))?;
        Ok((profile, partner_id))
    }

    pub async fn current_match(&self, user_id: &str) -> Result<Option<CurrentMatch>, InteractionError> {
        let profile = self.load(user_id).await?;
        if !profile.is_matched() {
            return Ok(None);
        }

        Ok(profile.current_match_id.map(|partner_id| CurrentMatch {
            partner_id,
            score: profile.match_score,
            matched_at: profile.matched_at,
            accepted: profile.match_accepted,
        }))
    }

    pub async fn accept_match(&self, user_id: &str) -> Result<(), InteractionError> {
        let (mut profile, partner_id) = self.load_matched(user_id).await?;
        profile.match_accepted = true;
        self.save(&profile).await?;

        tracing::info!("{} accepted match with {}", user_id, partner_id);
        Ok(())
    }

    /// Dissolve the current match and never pair the two again.
    ///
    /// The rejecting profile records the partner in `rejected_matches`; the
    /// partner is freed only if it still points back at the rejecter.
    pub async fn reject_match(&self, user_id: &str) -> Result<(), InteractionError> {
        let (mut profile, partner_id) = self.load_matched(user_id).await?;

        profile.rejected_matches.insert(partner_id.clone());
        profile.clear_match();
        self.save(&profile).await?;

        match self.store.get_profile(&partner_id).await? {
            Some(mut partner) if partner.current_match_id.as_deref() == Some(user_id) => {
                partner.clear_match();
                self.save(&partner).await?;
            }
            Some(_) => {}
            None => tracing::warn!("Rejected partner {} no longer exists", partner_id),
        }

        tracing::info!("{} rejected match with {}", user_id, partner_id);
        Ok(())
    }

    pub async fn set_matching_active(&self, user_id: &str, active: bool) -> Result<(), InteractionError> {
        let mut profile = self.load(user_id).await?;
        if profile.matching_active == active {
            return Ok(());
        }

        profile.matching_active = active;
        self.save(&profile).await
    }

    /// Conversation with the current partner, if one was recorded
    pub async fn conversation(&self, user_id: &str) -> Result<Option<MatchRecord>, InteractionError> {
        let (_, partner_id) = self.load_matched(user_id).await?;
        Ok(self.store.get_conversation(user_id, &partner_id).await?)
    }

    /// Append a message to the conversation with the current partner
    pub async fn post_message(&self, sender_id: &str, content: &str) -> Result<ChatMessage, InteractionError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(InteractionError::EmptyMessage);
        }

        let (profile, partner_id) = self.load_matched(sender_id).await?;

        // A match can stand without its record if that write failed at commit time
        let mut record = match self.store.get_conversation(sender_id, &partner_id).await? {
            Some(record) => record,
            None => {
                let mut record = MatchRecord::new(sender_id, &partner_id, profile.match_score.unwrap_or_default(), "");
                record.match_score = profile.match_score;
                record.reasoning = None;
                record
            }
        };

        let message = record.push_message(sender_id, content).clone();
        self.store.put_conversation(&record).await?;

        Ok(message)
    }
}
