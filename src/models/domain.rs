use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Number of dimensions a complete profile carries
pub const MAX_DIMENSIONS: usize = 29;

/// Every dimension name the profile-building conversation may fill in
pub const DIMENSION_NAMES: [&str; 30] = [
    "gender", "age", "location", "education", "career", "finances",
    "family_origin", "children", "religion", "politics", "vision",
    "communication", "conflict", "affection", "humor", "domestic",
    "cleanliness", "food", "time", "technology", "health", "mental_health",
    "social_energy", "substances", "hobbies", "travel", "culture", "pets",
    "independence", "decisions",
];

/// Dimensions compared one-by-one by the rule-based scorer
pub const LIFESTYLE_DIMENSIONS: [&str; 10] = [
    "social_energy", "domestic", "cleanliness", "food", "travel",
    "hobbies", "culture", "humor", "pets", "substances",
];

/// Sparse map of dimension name to the value gathered for it
pub type Dimensions = BTreeMap<String, Value>;

/// Declared gender, restricted to the two values the matching policy pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Interpret a stored gender value. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "male" | "m" | "man" => Some(Gender::Male),
            "female" | "f" | "woman" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// User profile as persisted in the profile store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Profile {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[validate(range(min = 18, max = 120))]
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default = "default_true")]
    pub matching_active: bool,
    #[serde(default)]
    pub current_match_id: Option<String>,
    #[serde(default)]
    pub match_score: Option<u8>,
    #[serde(default, deserialize_with = "lenient_timestamp::optional")]
    pub matched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub match_accepted: bool,
    #[serde(default)]
    pub rejected_matches: BTreeSet<String>,
    /// Optimistic concurrency counter, bumped by every store write
    #[serde(default)]
    pub version: u64,
}

fn default_true() -> bool { true }

impl Profile {
    /// A fresh, unmatched profile with no dimensions
    pub fn new(user_id: impl Into<String>, age: Option<u8>, gender: Option<&str>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            age,
            gender: gender.map(str::to_string),
            dimensions: Dimensions::new(),
            matching_active: true,
            current_match_id: None,
            match_score: None,
            matched_at: None,
            match_accepted: false,
            rejected_matches: BTreeSet::new(),
            version: 0,
        }
    }

    /// Builder-style helper to set a dimension value
    pub fn with_dimension(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.dimensions.insert(name.to_string(), value.into());
        self
    }

    pub fn declared_gender(&self) -> Option<Gender> {
        self.gender.as_deref().and_then(Gender::parse)
    }

    /// A dimension that carries a usable value (not null, not blank)
    pub fn dimension(&self, name: &str) -> Option<&Value> {
        self.dimensions.get(name).filter(|v| is_filled(v))
    }

    /// A dimension whose value is a non-blank string
    pub fn dimension_text(&self, name: &str) -> Option<&str> {
        self.dimension(name).and_then(Value::as_str)
    }

    /// Count of filled dimensions, used to rank completeness
    pub fn filled_dimensions(&self) -> usize {
        self.dimensions.values().filter(|v| is_filled(v)).count()
    }

    pub fn completion_percentage(&self) -> u8 {
        let filled = self.filled_dimensions().min(MAX_DIMENSIONS);
        ((filled * 100) as f64 / MAX_DIMENSIONS as f64).round() as u8
    }

    pub fn is_matched(&self) -> bool {
        self.current_match_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn has_rejected(&self, user_id: &str) -> bool {
        self.rejected_matches.contains(user_id)
    }

    /// Point this profile at a new partner
    pub fn assign_match(&mut self, partner_id: &str, score: u8, matched_at: DateTime<Utc>) {
        self.current_match_id = Some(partner_id.to_string());
        self.match_score = Some(score);
        self.matched_at = Some(matched_at);
        self.match_accepted = false;
    }

    /// Drop the current match and everything tied to it
    pub fn clear_match(&mut self) {
        self.current_match_id = None;
        self.match_score = None;
        self.matched_at = None;
        self.match_accepted = false;
    }
}

fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Timestamps accept RFC 3339 as well as offset-less values such as
/// `2024-05-01T12:00:00.123456`, which are read as UTC.
pub(crate) mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub(crate) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn required<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw))),
        }
    }
}

/// Order two ids so a pair always maps to the same key
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// One message inside a match conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub content: String,
    #[serde(deserialize_with = "lenient_timestamp::required")]
    pub sent_at: DateTime<Utc>,
}

/// Conversation container created when two profiles are paired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub user1_id: String,
    pub user2_id: String,
    #[serde(deserialize_with = "lenient_timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub match_score: Option<u8>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl MatchRecord {
    pub fn new(a: &str, b: &str, score: u8, reasoning: impl Into<String>) -> Self {
        let (user1, user2) = canonical_pair(a, b);
        Self {
            user1_id: user1.to_string(),
            user2_id: user2.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
            match_score: Some(score),
            reasoning: Some(reasoning.into()),
        }
    }

    /// Storage key for the conversation between `a` and `b`
    pub fn key_for(a: &str, b: &str) -> String {
        let (user1, user2) = canonical_pair(a, b);
        format!("{}_{}", user1, user2)
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.user1_id, &self.user2_id)
    }

    /// Append a message; the list is never reordered or truncated
    pub fn push_message(&mut self, sender_id: &str, content: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage {
            id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            content: content.into(),
            sent_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }
}

/// Rule-based scoring weights (points per factor)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    pub age: u32,
    pub location: u32,
    pub religion: u32,
    pub children: u32,
    pub education: u32,
    pub career: u32,
    pub lifestyle: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            age: 10,
            location: 15,
            religion: 20,
            children: 15,
            education: 5,
            career: 5,
            lifestyle: 2,
        }
    }
}

/// Weights for the on-demand pairwise match analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisWeights {
    pub location: f64,
    pub age: f64,
    pub interests: f64,
    pub values: f64,
    pub personality: f64,
}

impl Default for AnalysisWeights {
    fn default() -> Self {
        Self {
            location: 0.20,
            age: 0.15,
            interests: 0.25,
            values: 0.25,
            personality: 0.15,
        }
    }
}
