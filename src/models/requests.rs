use serde::{Deserialize, Serialize};
use crate::models::domain::{Dimensions, Profile};

/// The subset of a profile that may be sent to the scoring backend.
///
/// Names, contact details and matching state never leave the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub user_id: String,
    pub age: Option<u8>,
    pub gender: Option<String>,
    pub dimensions: Dimensions,
    pub completion_percentage: u8,
}

impl From<&Profile> for ScoringProfile {
    fn from(profile: &Profile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            age: profile.age,
            gender: profile.declared_gender().map(|g| g.to_string()),
            dimensions: profile.dimensions.clone(),
            completion_percentage: profile.completion_percentage(),
        }
    }
}

/// Options for a single batch invocation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Compute everything but persist nothing
    pub dry_run: bool,
    /// Record a per-candidate decision trace
    pub verbose: bool,
}
