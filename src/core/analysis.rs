//! On-demand pairwise match analysis.
//!
//! Shares the scorer contract but applies hard disqualifiers first and
//! blends component scores with its own weights.

use crate::models::{AnalysisWeights, CompatibilityAssessment, Gender, Profile};
use serde_json::Value;
use std::collections::BTreeSet;

/// Maximum age gap accepted by the analysis
pub const MAX_AGE_GAP: u8 = 20;
/// How many years younger than the woman the man may be
pub const MAX_MALE_YOUNGER_BY: u8 = 5;
/// Personality component when no backend verdict is available
pub const NEUTRAL_COMPONENT: f64 = 50.0;

const INTEREST_DIMENSIONS: [&str; 4] = ["hobbies", "culture", "travel", "food"];
const VALUE_DIMENSIONS: [&str; 4] = ["religion", "politics", "vision", "family_origin"];
const DEALBREAKER_DIMENSION: &str = "dealbreakers";

/// Return the first disqualifier triggered by the pair, if any
pub fn check_dealbreakers(a: &Profile, b: &Profile) -> Option<String> {
    let (Some(age_a), Some(age_b)) = (a.age, b.age) else {
        return Some("Missing age".to_string());
    };
    let (Some(gender_a), Some(gender_b)) = (a.declared_gender(), b.declared_gender()) else {
        return Some("Missing or unrecognised gender".to_string());
    };

    if gender_a == gender_b {
        return Some("Same sex match not supported".to_string());
    }

    if age_a.abs_diff(age_b) > MAX_AGE_GAP {
        return Some("Age gap too large".to_string());
    }

    let (male_age, female_age) = if gender_a == Gender::Male { (age_a, age_b) } else { (age_b, age_a) };
    if male_age.saturating_add(MAX_MALE_YOUNGER_BY) < female_age {
        return Some("Male significantly younger than female".to_string());
    }

    if let Some(conflict) = dealbreaker_conflict(a, b).or_else(|| dealbreaker_conflict(b, a)) {
        return Some(format!("Dealbreaker conflict ({})", conflict));
    }

    None
}

/// First item of `holder`'s dealbreakers listed among `other`'s values
fn dealbreaker_conflict(holder: &Profile, other: &Profile) -> Option<String> {
    let dealbreakers = items(holder, &[DEALBREAKER_DIMENSION]);
    if dealbreakers.is_empty() {
        return None;
    }
    let values = items(other, &VALUE_DIMENSIONS);
    dealbreakers.intersection(&values).next().cloned()
}

/// Score a pair, returning 0 immediately when a disqualifier triggers.
///
/// `personality` is the backend's verdict when one was obtained.
pub fn analyze_match(
    a: &Profile,
    b: &Profile,
    weights: &AnalysisWeights,
    personality: Option<u8>,
) -> CompatibilityAssessment {
    if let Some(reason) = check_dealbreakers(a, b) {
        return CompatibilityAssessment {
            score: 0,
            reasoning: format!("Match failed: {}", reason),
            strengths: "None identified".to_string(),
            concerns: reason,
        };
    }

    // Both ages are present past the dealbreaker check
    let gap = a.age.unwrap_or_default().abs_diff(b.age.unwrap_or_default());

    let location = location_score(a.dimension_text("location"), b.dimension_text("location"));
    let age = age_score(gap);
    let interests_a = items(a, &INTEREST_DIMENSIONS);
    let interests_b = items(b, &INTEREST_DIMENSIONS);
    let values_a = items(a, &VALUE_DIMENSIONS);
    let values_b = items(b, &VALUE_DIMENSIONS);
    let interests = jaccard(&interests_a, &interests_b);
    let values = jaccard(&values_a, &values_b);
    let personality = personality.map(f64::from).unwrap_or(NEUTRAL_COMPONENT);

    let total = location * weights.location
        + age * weights.age
        + interests * weights.interests
        + values * weights.values
        + personality * weights.personality;

    let common: Vec<&str> = interests_a
        .intersection(&interests_b)
        .chain(values_a.intersection(&values_b))
        .map(String::as_str)
        .collect();

    let mut concerns = Vec::new();
    if gap > 10 {
        concerns.push(format!("{} year age gap", gap));
    }
    if location <= NEUTRAL_COMPONENT {
        concerns.push("different regions".to_string());
    }

    CompatibilityAssessment {
        score: total.round().clamp(0.0, 100.0) as u8,
        reasoning: format!(
            "Location {:.0}/100, age {:.0}/100, interests {:.0}/100, values {:.0}/100, personality {:.0}/100.",
            location, age, interests, values, personality
        ),
        strengths: if common.is_empty() {
            "None identified".to_string()
        } else {
            format!("Common ground: {}", common.join(", "))
        },
        concerns: if concerns.is_empty() {
            "None identified".to_string()
        } else {
            concerns.join("; ")
        },
    }
}

/// Same city 100, same state 75, otherwise 50
fn location_score(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return NEUTRAL_COMPONENT;
    };

    let split = |loc: &str| -> (String, Option<String>) {
        let mut parts = loc.splitn(2, ',').map(|p| p.trim().to_lowercase());
        let city = parts.next().unwrap_or_default();
        let state = parts.next().filter(|s| !s.is_empty());
        (city, state)
    };

    let (city_a, state_a) = split(a);
    let (city_b, state_b) = split(b);

    if city_a == city_b {
        100.0
    } else if state_a.is_some() && state_a == state_b {
        75.0
    } else {
        50.0
    }
}

fn age_score(gap: u8) -> f64 {
    match gap {
        0..=5 => 100.0,
        6..=10 => 80.0,
        11..=15 => 60.0,
        _ => (100.0 - f64::from(gap) * 5.0).max(0.0),
    }
}

/// Lowercased list items gathered from the given dimensions
fn items(profile: &Profile, dimensions: &[&str]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for name in dimensions {
        match profile.dimension(name) {
            Some(Value::Array(values)) => {
                out.extend(values.iter().filter_map(Value::as_str).map(normalize_item));
            }
            Some(Value::String(text)) => {
                out.extend(text.split([',', ';', '/']).map(normalize_item));
            }
            _ => {}
        }
    }
    out.remove("");
    out
}

fn normalize_item(item: &str) -> String {
    item.trim().to_lowercase()
}

/// Overlap percentage; neutral when neither side has anything
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return NEUTRAL_COMPONENT;
    }
    a.intersection(b).count() as f64 / union as f64 * 100.0
}
