use crate::models::{CompatibilityAssessment, Profile, ScoringWeights, LIFESTYLE_DIMENSIONS};
use serde_json::Value;
use std::collections::BTreeSet;

/// Score returned when the two profiles share no comparable field
pub const DEFAULT_SCORE: u8 = 50;

/// One comparable factor and how much of its weight the pair earned
#[derive(Debug, Clone, Copy)]
struct Factor {
    label: &'static str,
    achieved: u32,
    max: u32,
}

/// Calculate a deterministic rule-based compatibility score (0-100)
///
/// Every factor is only counted when both profiles populate it:
///
/// score = round(achieved / max * 100), where
///     age proximity       10   (<= 5 years full, <= 10 years half)
///     location            15   (exact full, shared word about half)
///     religion            20   (exact full, both "none" three quarters)
///     children            15   (same yes/no full, either "maybe" half)
///     education            5   (both present)
///     career               5   (both present)
///     lifestyle dims       2   each, both present
///
/// With nothing comparable the score is `DEFAULT_SCORE`.
pub fn calculate_compatibility(
    a: &Profile,
    b: &Profile,
    weights: &ScoringWeights,
) -> CompatibilityAssessment {
    let mut factors = Vec::new();

    if let (Some(age_a), Some(age_b)) = (a.age, b.age) {
        factors.push(Factor {
            label: "age",
            achieved: age_points(age_a, age_b, weights.age),
            max: weights.age,
        });
    }

    if let (Some(loc_a), Some(loc_b)) = (a.dimension("location"), b.dimension("location")) {
        factors.push(Factor {
            label: "location",
            achieved: location_points(loc_a, loc_b, weights.location),
            max: weights.location,
        });
    }

    if let (Some(rel_a), Some(rel_b)) = (a.dimension("religion"), b.dimension("religion")) {
        factors.push(Factor {
            label: "religion",
            achieved: religion_points(rel_a, rel_b, weights.religion),
            max: weights.religion,
        });
    }

    if let (Some(kids_a), Some(kids_b)) = (a.dimension("children"), b.dimension("children")) {
        factors.push(Factor {
            label: "children",
            achieved: children_points(kids_a, kids_b, weights.children),
            max: weights.children,
        });
    }

    for (label, weight) in [("education", weights.education), ("career", weights.career)] {
        if a.dimension(label).is_some() && b.dimension(label).is_some() {
            factors.push(Factor { label, achieved: weight, max: weight });
        }
    }

    for label in LIFESTYLE_DIMENSIONS {
        if a.dimension(label).is_some() && b.dimension(label).is_some() {
            factors.push(Factor {
                label,
                achieved: weights.lifestyle,
                max: weights.lifestyle,
            });
        }
    }

    let max: u32 = factors.iter().map(|f| f.max).sum();
    if max == 0 {
        return CompatibilityAssessment {
            score: DEFAULT_SCORE,
            reasoning: "No comparable fields between the two profiles; using the neutral default.".to_string(),
            strengths: "None identified".to_string(),
            concerns: "Profiles too sparse to compare".to_string(),
        };
    }

    let achieved: u32 = factors.iter().map(|f| f.achieved).sum();
    let score = ((achieved as f64 / max as f64) * 100.0).round().clamp(0.0, 100.0) as u8;

    let strengths = join_labels(factors.iter().filter(|f| f.achieved == f.max));
    let concerns = join_labels(factors.iter().filter(|f| f.achieved == 0));

    CompatibilityAssessment {
        score,
        reasoning: format!(
            "Rule-based score over {} comparable factors ({} of {} points).",
            factors.len(),
            achieved,
            max
        ),
        strengths: strengths.unwrap_or_else(|| "None identified".to_string()),
        concerns: concerns.unwrap_or_else(|| "None identified".to_string()),
    }
}

fn join_labels<'a>(factors: impl Iterator<Item = &'a Factor>) -> Option<String> {
    let labels: Vec<&str> = factors.map(|f| f.label).collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels.join(", "))
    }
}

/// Half of a weight, rounded up
#[inline]
fn half(weight: u32) -> u32 {
    (weight + 1) / 2
}

#[inline]
fn age_points(age_a: u8, age_b: u8, weight: u32) -> u32 {
    match age_a.abs_diff(age_b) {
        0..=5 => weight,
        6..=10 => half(weight),
        _ => 0,
    }
}

/// Lowercased alphanumeric words of a free-text value
pub(crate) fn tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[inline]
fn location_points(a: &Value, b: &Value, weight: u32) -> u32 {
    let (Some(a), Some(b)) = (a.as_str(), b.as_str()) else {
        return 0;
    };

    if a.trim().eq_ignore_ascii_case(b.trim()) {
        return weight;
    }

    if tokens(a).intersection(&tokens(b)).next().is_some() {
        return half(weight);
    }

    0
}

#[inline]
fn religion_points(a: &Value, b: &Value, weight: u32) -> u32 {
    let (Some(a), Some(b)) = (a.as_str(), b.as_str()) else {
        return 0;
    };

    if a.trim().eq_ignore_ascii_case(b.trim()) {
        return weight;
    }

    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a.contains("none") && b.contains("none") {
        return weight * 3 / 4;
    }

    0
}

const NEGATIONS: [&str; 7] = ["no", "not", "don", "dont", "never", "doesn", "doesnt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Yes,
    No,
    Maybe,
    Unknown,
}

fn children_polarity(value: &Value) -> Polarity {
    match value {
        Value::Bool(true) => Polarity::Yes,
        Value::Bool(false) => Polarity::No,
        Value::Number(n) => match n.as_f64() {
            Some(count) if count > 0.0 => Polarity::Yes,
            Some(_) => Polarity::No,
            None => Polarity::Unknown,
        },
        Value::String(text) => {
            let lower = text.to_lowercase();
            if ["maybe", "not sure", "unsure", "undecided", "open to"]
                .iter()
                .any(|phrase| lower.contains(phrase))
            {
                return Polarity::Maybe;
            }

            let words: Vec<&str> = lower
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
                .collect();
            let is_negation = |w: &&str| NEGATIONS.contains(w);

            // An explicit yes wins over any hedging that follows it
            if words.iter().any(|w| ["yes", "definitely"].contains(w)) {
                return Polarity::Yes;
            }

            // "want" counts unless a negation sits just before it ("don't want")
            if let Some(at) = words.iter().position(|w| ["want", "wants", "someday"].contains(w)) {
                let negated = words[at.saturating_sub(2)..at].iter().any(is_negation);
                return if negated { Polarity::No } else { Polarity::Yes };
            }

            if words.iter().any(is_negation) || words.contains(&"childfree") {
                Polarity::No
            } else {
                Polarity::Unknown
            }
        }
        _ => Polarity::Unknown,
    }
}

#[inline]
fn children_points(a: &Value, b: &Value, weight: u32) -> u32 {
    match (children_polarity(a), children_polarity(b)) {
        (Polarity::Yes, Polarity::Yes) | (Polarity::No, Polarity::No) => weight,
        (Polarity::Maybe, _) | (_, Polarity::Maybe) => half(weight),
        _ => 0,
    }
}
