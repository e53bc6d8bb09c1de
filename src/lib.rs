//! LoveDash Match - compatibility scoring and batch pairing engine
//!
//! This library pairs eligible profiles one-to-one: each pair is scored by
//! an external completion backend when one is configured, with a
//! deterministic rule-based fallback, and pairings are committed to the
//! profile store through version-checked writes.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{BatchRunner, CompatibilityScorer, MatchInteractions, MatchStateUpdater, PairingEngine};
pub use models::{MatchRecord, Profile, RunOptions, RunSummary, ScoringWeights};
pub use services::{InMemoryStore, JsonFileStore, ProfileStore, RunLogSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let a = Profile::new("a", Some(30), Some("male"));
        let b = Profile::new("b", Some(30), Some("female"));
        let result = crate::core::calculate_compatibility(&a, &b, &ScoringWeights::default());
        assert_eq!(result.score, 100);
    }
}
