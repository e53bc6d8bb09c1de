// Core algorithm exports
pub mod analysis;
pub mod batch;
pub mod commit;
pub mod compatibility;
pub mod filters;
pub mod interactions;
pub mod matcher;
pub mod scoring;

pub use analysis::{analyze_match, check_dealbreakers};
pub use batch::{BatchError, BatchRunner, INSUFFICIENT_POOL};
pub use commit::{CommitError, CommitOutcome, MatchStateUpdater};
pub use compatibility::{build_compatibility_prompt, parse_assessment, CompatibilityScorer, DEFAULT_BACKEND_TIMEOUT};
pub use filters::{hard_constraint_violation, is_eligible, select_eligible, validate_candidate, Candidate, EligiblePool, InvalidProfileData};
pub use interactions::{CurrentMatch, InteractionError, MatchInteractions};
pub use matcher::{PairingEngine, PairingOutcome, DEFAULT_MIN_SCORE};
pub use scoring::{calculate_compatibility, DEFAULT_SCORE};
