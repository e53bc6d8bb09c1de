use crate::models::{Gender, InvalidProfile, Profile, SkipReason};
use thiserror::Error;
use validator::Validate;

/// Why a profile cannot take part in pairing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidProfileData {
    #[error("missing age")]
    MissingAge,

    #[error("missing or unrecognised gender: {0:?}")]
    InvalidGender(Option<String>),

    #[error("failed validation: {0}")]
    Validation(String),
}

/// A validated profile ready for pairing
#[derive(Debug, Clone)]
pub struct Candidate {
    pub profile: Profile,
    pub gender: Gender,
    /// Number of filled dimensions
    pub completeness: usize,
}

impl Candidate {
    pub fn id(&self) -> &str {
        &self.profile.user_id
    }
}

/// The candidate pool for one run
#[derive(Debug, Default)]
pub struct EligiblePool {
    pub candidates: Vec<Candidate>,
    pub invalid: Vec<InvalidProfile>,
}

/// Eligibility policy: opted in to matching and not currently matched.
///
/// Age and payment gating is deliberately not applied here, so incomplete
/// profiles still enter the pool.
#[inline]
pub fn is_eligible(profile: &Profile) -> bool {
    profile.matching_active && !profile.is_matched()
}

/// Check the fields pairing depends on
pub fn validate_candidate(profile: Profile) -> Result<Candidate, InvalidProfileData> {
    profile
        .validate()
        .map_err(|e| InvalidProfileData::Validation(e.to_string()))?;

    if profile.age.is_none() {
        return Err(InvalidProfileData::MissingAge);
    }
    let gender = profile
        .declared_gender()
        .ok_or_else(|| InvalidProfileData::InvalidGender(profile.gender.clone()))?;
    let completeness = profile.filled_dimensions();

    Ok(Candidate {
        profile,
        gender,
        completeness,
    })
}

/// Select the eligible pool, keeping input order
pub fn select_eligible(profiles: impl IntoIterator<Item = Profile>) -> EligiblePool {
    let mut pool = EligiblePool::default();

    for profile in profiles.into_iter().filter(is_eligible) {
        let user_id = profile.user_id.clone();
        match validate_candidate(profile) {
            Ok(candidate) => pool.candidates.push(candidate),
            Err(e) => {
                tracing::warn!("Skipping profile {} as a candidate: {}", user_id, e);
                pool.invalid.push(InvalidProfile {
                    user_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    pool
}

/// Hard constraints between a profile and a candidate.
///
/// Returns the first violated constraint, or `None` when the pair may be scored.
#[inline]
pub fn hard_constraint_violation(profile: &Candidate, candidate: &Candidate) -> Option<SkipReason> {
    if profile.id() == candidate.id() {
        return Some(SkipReason::SameProfile);
    }

    if profile.gender == candidate.gender {
        return Some(SkipReason::SameGender);
    }

    if profile.profile.has_rejected(candidate.id()) {
        return Some(SkipReason::RejectedByProfile);
    }

    if candidate.profile.has_rejected(profile.id()) {
        return Some(SkipReason::RejectedByCandidate);
    }

    None
}
