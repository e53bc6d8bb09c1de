use crate::core::{
    commit::{CommitError, MatchStateUpdater},
    compatibility::CompatibilityScorer,
    filters::{hard_constraint_violation, Candidate},
};
use crate::models::{CandidateDecision, HalfMatch, MatchedPair, RunOptions, ScoredPair};
use futures::stream::{self, StreamExt};

/// Lowest score that leads to a commit
pub const DEFAULT_MIN_SCORE: u8 = 30;

/// Result of one pairing sweep
#[derive(Debug, Default)]
pub struct PairingOutcome {
    pub matches: Vec<MatchedPair>,
    pub half_matches: Vec<HalfMatch>,
    pub abandoned_pairings: usize,
    pub warnings: Vec<String>,
    /// Filled only in verbose mode
    pub decisions: Vec<CandidateDecision>,
}

/// Greedy one-to-one pairing over an eligible pool
///
/// # Sweep
/// 1. Stable sort by filled dimensions, most complete first
/// 2. For every unclaimed profile P, score every unclaimed candidate that
///    passes the hard constraints, in pool order
/// 3. Keep the highest score; the first candidate seen wins ties
/// 4. Commit when the best score reaches the threshold, claiming both sides
///
/// Claimed profiles are never reconsidered within the sweep, so every
/// profile ends up in at most one pairing.
#[derive(Clone)]
pub struct PairingEngine {
    scorer: CompatibilityScorer,
    updater: MatchStateUpdater,
    min_score: u8,
    scoring_concurrency: usize,
}

impl PairingEngine {
    pub fn new(scorer: CompatibilityScorer, updater: MatchStateUpdater) -> Self {
        Self {
            scorer,
            updater,
            min_score: DEFAULT_MIN_SCORE,
            scoring_concurrency: 1,
        }
    }

    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score;
        self
    }

    /// Score up to `limit` candidates of one profile at a time
    pub fn with_scoring_concurrency(mut self, limit: usize) -> Self {
        self.scoring_concurrency = limit.max(1);
        self
    }

    pub async fn run(&self, mut pool: Vec<Candidate>, options: RunOptions) -> PairingOutcome {
        pool.sort_by(|a, b| b.completeness.cmp(&a.completeness));

        let mut claimed = vec![false; pool.len()];
        let mut outcome = PairingOutcome::default();

        for i in 0..pool.len() {
            if claimed[i] {
                continue;
            }
            let profile = &pool[i];

            let mut eligible = Vec::new();
            for (j, candidate) in pool.iter().enumerate() {
                if j == i || claimed[j] {
                    continue;
                }
                match hard_constraint_violation(profile, candidate) {
                    Some(reason) => {
                        if options.verbose {
                            outcome.decisions.push(CandidateDecision::Skipped {
                                profile_id: profile.id().to_string(),
                                candidate_id: candidate.id().to_string(),
                                reason,
                            });
                        }
                    }
                    None => eligible.push(j),
                }
            }

            let scores = self.score_candidates(profile, &pool, &eligible).await;

            let mut best: Option<(usize, ScoredPair)> = None;
            for (&j, scored) in eligible.iter().zip(scores) {
                if options.verbose {
                    outcome.decisions.push(CandidateDecision::Scored {
                        profile_id: profile.id().to_string(),
                        candidate_id: pool[j].id().to_string(),
                        score: scored.score(),
                        source: scored.source,
                    });
                }
                let better = best
                    .as_ref()
                    .map_or(true, |(_, current)| scored.score() > current.score());
                if better {
                    best = Some((j, scored));
                }
            }

            let (j, scored) = match best {
                Some((j, scored)) if scored.score() >= self.min_score => (j, scored),
                other => {
                    tracing::debug!(
                        "No candidate for {} reached {} (best {:?})",
                        profile.id(),
                        self.min_score,
                        other.as_ref().map(|(_, s)| s.score())
                    );
                    if options.verbose {
                        outcome.decisions.push(CandidateDecision::BelowThreshold {
                            profile_id: profile.id().to_string(),
                            best_candidate_id: other.as_ref().map(|(j, _)| pool[*j].id().to_string()),
                            best_score: other.as_ref().map(|(_, s)| s.score()),
                        });
                    }
                    continue;
                }
            };

            let candidate = &pool[j];
            let pair = MatchedPair {
                user1: profile.id().to_string(),
                user2: candidate.id().to_string(),
                score: scored.score(),
            };

            if options.dry_run {
                tracing::info!("[dry run] Would match {} with {} (score {})", pair.user1, pair.user2, pair.score);
            } else {
                let committed = self
                    .updater
                    .commit(&profile.profile, &candidate.profile, scored.score(), &scored.assessment.reasoning)
                    .await;

                match committed {
                    Ok(commit) => {
                        outcome.warnings.extend(commit.conversation_warning);
                    }
                    Err(e) => {
                        let error = e.to_string();
                        if options.verbose {
                            outcome.decisions.push(CandidateDecision::CommitFailed {
                                profile_id: pair.user1.clone(),
                                candidate_id: pair.user2.clone(),
                                error: error.clone(),
                            });
                        }

                        // P's snapshot is stale or already written; it is not offered again
                        claimed[i] = true;
                        match e {
                            CommitError::FirstWrite { .. } => {
                                tracing::warn!("Abandoned pairing {} / {}: {}", pair.user1, pair.user2, error);
                                outcome.abandoned_pairings += 1;
                            }
                            CommitError::HalfMatch { written_id, failed_id, .. } => {
                                outcome.half_matches.push(HalfMatch {
                                    written_id,
                                    failed_id,
                                    error,
                                });
                            }
                        }
                        continue;
                    }
                }
            }

            if options.verbose {
                outcome.decisions.push(CandidateDecision::Committed {
                    profile_id: pair.user1.clone(),
                    candidate_id: pair.user2.clone(),
                    score: pair.score,
                });
            }
            claimed[i] = true;
            claimed[j] = true;
            outcome.matches.push(pair);
        }

        outcome
    }

    /// Scores in the same order as `eligible`
    async fn score_candidates(&self, profile: &Candidate, pool: &[Candidate], eligible: &[usize]) -> Vec<ScoredPair> {
        if self.scoring_concurrency <= 1 {
            let mut scores = Vec::with_capacity(eligible.len());
            for &j in eligible {
                scores.push(self.scorer.score(&profile.profile, &pool[j].profile).await);
            }
            return scores;
        }

        stream::iter(eligible.iter().map(|&j| self.scorer.score(&profile.profile, &pool[j].profile)))
            .buffered(self.scoring_concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filters::validate_candidate;
    use crate::models::{Profile, ScoringWeights};
    use crate::services::{InMemoryStore, ProfileStore};
    use std::sync::Arc;

    fn candidate(id: &str, gender: &str, dims: &[(&str, &str)]) -> Candidate {
        let mut profile = Profile::new(id, Some(30), Some(gender));
        for (name, value) in dims {
            profile = profile.with_dimension(name, *value);
        }
        validate_candidate(profile).unwrap()
    }

    async fn engine_over(pool: &[Candidate]) -> (PairingEngine, InMemoryStore) {
        let store = InMemoryStore::with_profiles(pool.iter().map(|c| c.profile.clone())).await;
        let engine = PairingEngine::new(
            CompatibilityScorer::rule_based(ScoringWeights::default()),
            MatchStateUpdater::new(Arc::new(store.clone())),
        );
        (engine, store)
    }

    const SHARED: [(&str, &str); 2] = [("religion", "Christian"), ("location", "Denver")];

    #[tokio::test]
    async fn test_first_seen_wins_ties() {
        let pool = vec![
            candidate("w1", "female", &SHARED),
            candidate("w2", "female", &SHARED),
            candidate("m", "male", &[("religion", "Christian"), ("location", "Denver"), ("children", "yes")]),
        ];
        let (engine, _) = engine_over(&pool).await;

        let outcome = engine.run(pool, RunOptions::default()).await;

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].user1, "m");
        assert_eq!(outcome.matches[0].user2, "w1");
    }

    #[tokio::test]
    async fn test_each_profile_matched_at_most_once() {
        let pool = vec![
            candidate("m1", "male", &SHARED),
            candidate("m2", "male", &SHARED),
            candidate("w1", "female", &SHARED),
        ];
        let (engine, store) = engine_over(&pool).await;

        let outcome = engine.run(pool, RunOptions::default()).await;

        assert_eq!(outcome.matches.len(), 1);
        let matched: Vec<_> = store.profiles().await.into_iter().filter(|p| p.is_matched()).collect();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().any(|p| p.user_id == "w1"));
    }

    #[tokio::test]
    async fn test_same_gender_never_paired() {
        let pool = vec![candidate("m1", "male", &SHARED), candidate("m2", "male", &SHARED)];
        let (engine, _) = engine_over(&pool).await;

        let outcome = engine.run(pool, RunOptions { dry_run: false, verbose: true }).await;

        assert!(outcome.matches.is_empty());
        assert!(outcome
            .decisions
            .iter()
            .any(|d| matches!(d, CandidateDecision::Skipped { reason: crate::models::SkipReason::SameGender, .. })));
    }

    #[tokio::test]
    async fn test_rejected_candidate_skipped() {
        let mut man = Profile::new("m", Some(30), Some("male"))
            .with_dimension("religion", "Christian")
            .with_dimension("location", "Denver")
            .with_dimension("children", "yes");
        man.rejected_matches.insert("w1".to_string());
        let pool = vec![
            validate_candidate(man).unwrap(),
            candidate("w1", "female", &[("religion", "Christian"), ("location", "Denver")]),
            candidate("w2", "female", &[("religion", "Hindu")]),
        ];
        let (engine, _) = engine_over(&pool).await;

        let outcome = engine.run(pool, RunOptions::default()).await;

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].user2, "w2");
    }

    #[tokio::test]
    async fn test_below_threshold_leaves_profiles_unmatched() {
        let man = Profile::new("m", Some(20), Some("male"))
            .with_dimension("religion", "Buddhist")
            .with_dimension("children", "no");
        let woman = Profile::new("w", Some(60), Some("female"))
            .with_dimension("religion", "Hindu")
            .with_dimension("children", "yes");
        let pool = vec![validate_candidate(man).unwrap(), validate_candidate(woman).unwrap()];
        let (engine, store) = engine_over(&pool).await;

        let outcome = engine.run(pool, RunOptions { dry_run: false, verbose: true }).await;

        assert!(outcome.matches.is_empty());
        assert_eq!(store.write_count(), 0);
        assert!(outcome
            .decisions
            .iter()
            .any(|d| matches!(d, CandidateDecision::BelowThreshold { best_score: Some(0), .. })));
    }

    #[tokio::test]
    async fn test_concurrent_scoring_keeps_tie_break() {
        let pool = vec![
            candidate("w1", "female", &SHARED),
            candidate("w2", "female", &SHARED),
            candidate("w3", "female", &SHARED),
            candidate("m", "male", &[("religion", "Christian"), ("location", "Denver"), ("children", "yes")]),
        ];
        let (engine, _) = engine_over(&pool).await;
        let engine = engine.with_scoring_concurrency(4);

        let outcome = engine.run(pool, RunOptions::default()).await;

        assert_eq!(outcome.matches[0].user2, "w1");
    }

    #[tokio::test]
    async fn test_half_match_reported() {
        let pool = vec![
            candidate("m", "male", &[("religion", "Christian"), ("location", "Denver"), ("children", "yes")]),
            candidate("w", "female", &SHARED),
        ];
        let (engine, store) = engine_over(&pool).await;
        store.fail_writes_for("w").await;

        let outcome = engine.run(pool, RunOptions::default()).await;

        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.half_matches.len(), 1);
        assert_eq!(outcome.half_matches[0].written_id, "m");
        let stored = store.get_profile("m").await.unwrap().unwrap();
        assert_eq!(stored.current_match_id.as_deref(), Some("w"));
    }
}
