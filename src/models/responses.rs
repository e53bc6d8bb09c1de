use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Compatibility verdict for a pair of profiles.
///
/// This is also the wire shape the scoring backend must reply with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityAssessment {
    pub score: u8,
    pub reasoning: String,
    pub strengths: String,
    pub concerns: String,
}

/// Which strategy produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Assisted,
    RuleBased,
    Analysis,
}

/// An assessment together with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredPair {
    #[serde(flatten)]
    pub assessment: CompatibilityAssessment,
    pub source: ScoreSource,
}

impl ScoredPair {
    pub fn score(&self) -> u8 {
        self.assessment.score
    }
}

/// A pairing produced by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub user1: String,
    pub user2: String,
    pub score: u8,
}

/// Why a candidate was never scored against a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SameProfile,
    SameGender,
    RejectedByProfile,
    RejectedByCandidate,
}

/// One entry of the verbose decision trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum CandidateDecision {
    Skipped {
        profile_id: String,
        candidate_id: String,
        reason: SkipReason,
    },
    Scored {
        profile_id: String,
        candidate_id: String,
        score: u8,
        source: ScoreSource,
    },
    Committed {
        profile_id: String,
        candidate_id: String,
        score: u8,
    },
    BelowThreshold {
        profile_id: String,
        best_candidate_id: Option<String>,
        best_score: Option<u8>,
    },
    CommitFailed {
        profile_id: String,
        candidate_id: String,
        error: String,
    },
}

/// A profile rejected by validation before pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidProfile {
    pub user_id: String,
    pub reason: String,
}

/// One side of a pairing was written and the other was not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfMatch {
    pub written_id: String,
    pub failed_id: String,
    pub error: String,
}

/// Everything a batch run computed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_profiles: usize,
    pub eligible_users: usize,
    pub matches_created: usize,
    pub matches: Vec<MatchedPair>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_profiles: Vec<InvalidProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub half_matches: Vec<HalfMatch>,
    #[serde(default)]
    pub abandoned_pairings: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<CandidateDecision>,
}

/// The record appended to the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub run_id: Uuid,
    #[serde(deserialize_with = "crate::models::domain::lenient_timestamp::required")]
    pub timestamp: DateTime<Utc>,
    pub total_profiles: usize,
    pub active_users: usize,
    pub matches_created: usize,
    pub matches: Vec<MatchedPair>,
    pub dry_run: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<&RunSummary> for RunLogEntry {
    fn from(summary: &RunSummary) -> Self {
        Self {
            run_id: summary.run_id,
            timestamp: summary.timestamp,
            total_profiles: summary.total_profiles,
            active_users: summary.eligible_users,
            matches_created: summary.matches_created,
            matches: summary.matches.clone(),
            dry_run: summary.dry_run,
            reason: summary.reason.clone(),
        }
    }
}
