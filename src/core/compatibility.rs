use crate::core::{analysis::{analyze_match, check_dealbreakers}, scoring::calculate_compatibility};
use crate::models::{
    AnalysisWeights, CompatibilityAssessment, Profile, ScoreSource, ScoredPair, ScoringProfile,
    ScoringWeights,
};
use crate::services::{CompletionBackend, ScoreCache, ScoringBackendError};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single backend call
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Evaluation rubric sent ahead of the two profiles
const COMPATIBILITY_RUBRIC: &str = r#"You assess long-term partnership compatibility for a marriage-focused matchmaking service that pairs one man with one woman.

Score the two profiles below from 0 to 100:
- 0-29 poor, 30-49 low, 50-69 moderate, 70-84 good, 85-100 excellent.

Weigh the evidence in this order:
1. Highest: values and family. Religion, politics, vision for the future, desire for children.
2. High: life stage and location. Age, where they live, readiness for commitment.
3. High: relationship fundamentals. Communication, conflict, affection.
4. Medium: daily life, social energy, health and substances, finances and career.
5. Lowest: shared interests and lifestyle details. Hobbies, travel, culture, humor, pets, food, technology.

Missing dimensions are unknown, not negative. Age gaps over ten years deserve a note but are not disqualifying on their own.

Reply with ONLY this JSON object and nothing else:
{"score": <integer 0-100>, "reasoning": "<2-3 sentences>", "strengths": "<2-3 strengths>", "concerns": "<1-2 concerns or 'None identified'>"}"#;

/// Build the backend prompt. Only non-sensitive fields are included.
pub fn build_compatibility_prompt(a: &Profile, b: &Profile) -> String {
    let render = |p: &Profile| {
        serde_json::to_string_pretty(&ScoringProfile::from(p)).unwrap_or_else(|_| "{}".to_string())
    };

    format!(
        "{}\n\n=== PROFILE 1 ===\n{}\n\n=== PROFILE 2 ===\n{}\n",
        COMPATIBILITY_RUBRIC,
        render(a),
        render(b)
    )
}

#[derive(Debug, Deserialize)]
struct RawAssessment {
    score: Value,
    reasoning: String,
    strengths: String,
    concerns: String,
}

/// Remove a surrounding ``` or ```json fence
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Parse a backend reply against the assessment schema
pub fn parse_assessment(reply: &str) -> Result<CompatibilityAssessment, ScoringBackendError> {
    let raw: RawAssessment = serde_json::from_str(strip_code_fences(reply))
        .map_err(|e| ScoringBackendError::Malformed(e.to_string()))?;

    let score = raw
        .score
        .as_i64()
        .ok_or_else(|| ScoringBackendError::Malformed(format!("score must be an integer, got {}", raw.score)))?;

    if !(0..=100).contains(&score) {
        return Err(ScoringBackendError::ScoreOutOfRange(score));
    }

    Ok(CompatibilityAssessment {
        score: score as u8,
        reasoning: raw.reasoning,
        strengths: raw.strengths,
        concerns: raw.concerns,
    })
}

/// Pair scorer: backend-assisted first, deterministic rules as fallback.
///
/// `score` never fails. Every backend problem (missing configuration,
/// transport error, timeout, malformed reply) degrades to the rule-based
/// verdict for that pair.
#[derive(Clone)]
pub struct CompatibilityScorer {
    backend: Option<Arc<dyn CompletionBackend>>,
    weights: ScoringWeights,
    analysis_weights: AnalysisWeights,
    timeout: Duration,
    cache: Option<ScoreCache>,
}

impl CompatibilityScorer {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>, weights: ScoringWeights, timeout: Duration) -> Self {
        Self {
            backend,
            weights,
            analysis_weights: AnalysisWeights::default(),
            timeout,
            cache: None,
        }
    }

    /// Scorer with no backend; every verdict is rule-based
    pub fn rule_based(weights: ScoringWeights) -> Self {
        Self::new(None, weights, DEFAULT_BACKEND_TIMEOUT)
    }

    pub fn with_cache(mut self, cache: ScoreCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_analysis_weights(mut self, weights: AnalysisWeights) -> Self {
        self.analysis_weights = weights;
        self
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Score a pair for batch pairing
    pub async fn score(&self, a: &Profile, b: &Profile) -> ScoredPair {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&a.user_id, &b.user_id).await {
                return hit;
            }
        }

        let scored = match self.assisted(a, b).await {
            Ok(assessment) => ScoredPair {
                assessment,
                source: ScoreSource::Assisted,
            },
            Err(e) => {
                if !matches!(e, ScoringBackendError::NotConfigured(_)) {
                    tracing::warn!(
                        "Assisted scoring failed for {} / {}, using rule-based fallback: {}",
                        a.user_id,
                        b.user_id,
                        e
                    );
                }
                ScoredPair {
                    assessment: calculate_compatibility(a, b, &self.weights),
                    source: ScoreSource::RuleBased,
                }
            }
        };

        if let Some(cache) = &self.cache {
            cache.insert(&a.user_id, &b.user_id, scored.clone()).await;
        }

        scored
    }

    /// On-demand pairwise match analysis.
    ///
    /// Disqualified pairs score 0 without consulting the backend. Otherwise
    /// the backend verdict, when available, feeds the personality component.
    pub async fn analyze(&self, a: &Profile, b: &Profile) -> ScoredPair {
        let personality = if check_dealbreakers(a, b).is_some() {
            None
        } else {
            match self.assisted(a, b).await {
                Ok(assessment) => Some(assessment.score),
                Err(e) => {
                    tracing::debug!("No personality verdict for {} / {}: {}", a.user_id, b.user_id, e);
                    None
                }
            }
        };

        ScoredPair {
            assessment: analyze_match(a, b, &self.analysis_weights, personality),
            source: ScoreSource::Analysis,
        }
    }

    async fn assisted(&self, a: &Profile, b: &Profile) -> Result<CompatibilityAssessment, ScoringBackendError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ScoringBackendError::NotConfigured("no scoring backend".into()))?;

        let prompt = build_compatibility_prompt(a, b);
        let reply = tokio::time::timeout(self.timeout, backend.complete(&prompt))
            .await
            .map_err(|_| ScoringBackendError::Timeout(self.timeout))??;

        let assessment = parse_assessment(&reply)?;
        tracing::debug!(
            "{} scored {} / {} at {}",
            backend.name(),
            a.user_id,
            b.user_id,
            assessment.score
        );
        Ok(assessment)
    }
}
