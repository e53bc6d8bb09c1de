use crate::core::{filters::select_eligible, matcher::PairingEngine};
use crate::models::{RunLogEntry, RunOptions, RunSummary};
use crate::services::{ProfileStore, RunLogSink, StoreError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Reason recorded when fewer than two profiles are eligible
pub const INSUFFICIENT_POOL: &str = "insufficient pool";

/// Errors that stop a batch run before any pairing happens
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Profile store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// One scheduled pairing pass: load, filter, pair, log
#[derive(Clone)]
pub struct BatchRunner {
    store: Arc<dyn ProfileStore>,
    run_log: Arc<dyn RunLogSink>,
    engine: PairingEngine,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn ProfileStore>, run_log: Arc<dyn RunLogSink>, engine: PairingEngine) -> Self {
        Self { store, run_log, engine }
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunSummary, BatchError> {
        let run_id = Uuid::new_v4();
        tracing::info!("Starting matching run {} (dry_run={})", run_id, options.dry_run);

        let ids = self.store.list_profile_ids().await?;
        let mut warnings = Vec::new();
        let mut profiles = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.store.get_profile(id).await {
                Ok(Some(profile)) => profiles.push(profile),
                Ok(None) => {
                    tracing::warn!("Profile {} disappeared during loading", id);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable profile {}: {}", id, e);
                    warnings.push(format!("profile {} not loaded: {}", id, e));
                }
            }
        }

        let pool = select_eligible(profiles);
        tracing::info!(
            "Loaded {} profiles, {} eligible, {} invalid",
            ids.len(),
            pool.candidates.len(),
            pool.invalid.len()
        );

        let mut summary = RunSummary {
            run_id,
            timestamp: Utc::now(),
            total_profiles: ids.len(),
            eligible_users: pool.candidates.len(),
            matches_created: 0,
            matches: Vec::new(),
            dry_run: options.dry_run,
            reason: None,
            invalid_profiles: pool.invalid,
            half_matches: Vec::new(),
            abandoned_pairings: 0,
            warnings,
            decisions: Vec::new(),
        };

        if pool.candidates.len() < 2 {
            tracing::info!("Not enough eligible profiles to pair");
            summary.reason = Some(INSUFFICIENT_POOL.to_string());
        } else {
            let outcome = self.engine.run(pool.candidates, options).await;
            summary.matches_created = outcome.matches.len();
            summary.matches = outcome.matches;
            summary.half_matches = outcome.half_matches;
            summary.abandoned_pairings = outcome.abandoned_pairings;
            summary.warnings.extend(outcome.warnings);
            summary.decisions = outcome.decisions;
        }

        if options.dry_run {
            tracing::info!("Dry run complete: {} matches would be created", summary.matches_created);
            return Ok(summary);
        }

        if let Err(e) = self.run_log.append_run(&RunLogEntry::from(&summary)).await {
            tracing::error!("Failed to record run {}: {}", run_id, e);
            summary.warnings.push(format!("run log not written: {}", e));
        }

        tracing::info!("Matching run {} complete: {} matches created", run_id, summary.matches_created);
        Ok(summary)
    }
}
