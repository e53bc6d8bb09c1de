// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    canonical_pair, AnalysisWeights, ChatMessage, Dimensions, Gender, MatchRecord, Profile,
    ScoringWeights, DIMENSION_NAMES, LIFESTYLE_DIMENSIONS, MAX_DIMENSIONS,
};
pub use requests::{RunOptions, ScoringProfile};
pub use responses::{
    CandidateDecision, CompatibilityAssessment, HalfMatch, InvalidProfile, MatchedPair,
    RunLogEntry, RunSummary, ScoreSource, ScoredPair, SkipReason,
};
