// Integration tests for LoveDash Match

use async_trait::async_trait;
use lovedash_match::core::{
    BatchRunner, CompatibilityScorer, MatchInteractions, MatchStateUpdater, PairingEngine, INSUFFICIENT_POOL,
};
use lovedash_match::models::{
    CandidateDecision, MatchRecord, Profile, RunOptions, RunSummary, ScoreSource, ScoringWeights,
};
use lovedash_match::services::{
    BackendProvider, CompletionBackend, HttpCompletionClient, InMemoryStore, JsonFileStore, ProfileStore,
    RunLogSink, ScoringBackendError, StoreError, StoreResult,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn create_test_profile(id: &str, age: u8, gender: &str, dims: &[(&str, &str)]) -> Profile {
    let mut profile = Profile::new(id, Some(age), Some(gender));
    for (name, value) in dims {
        profile = profile.with_dimension(name, *value);
    }
    profile
}

/// Six men and six women with overlapping but uneven dimensions
fn mixed_pool() -> Vec<Profile> {
    let cities = ["Denver", "Austin", "Denver", "Boston", "Austin", "Denver"];
    let faiths = ["Christian", "None", "Jewish", "Christian", "None", "Muslim"];
    let kids = ["yes", "no", "maybe", "yes", "no", "yes"];

    let mut pool = Vec::new();
    for i in 0..6 {
        let mut man = create_test_profile(
            &format!("m{}", i),
            28 + i as u8,
            "male",
            &[("location", cities[i]), ("religion", faiths[i])],
        );
        if i % 2 == 0 {
            man = man.with_dimension("children", kids[i]);
        }
        let woman = create_test_profile(
            &format!("w{}", i),
            26 + i as u8,
            "female",
            &[("location", cities[5 - i]), ("religion", faiths[(i + 2) % 6]), ("children", kids[i])],
        );
        pool.push(man);
        pool.push(woman);
    }
    pool
}

fn rule_based_runner(store: &InMemoryStore) -> BatchRunner {
    let engine = PairingEngine::new(
        CompatibilityScorer::rule_based(ScoringWeights::default()),
        MatchStateUpdater::new(Arc::new(store.clone())),
    );
    BatchRunner::new(Arc::new(store.clone()), Arc::new(store.clone()), engine)
}

fn assert_symmetric(profiles: &[Profile]) {
    let by_id: HashMap<&str, &Profile> = profiles.iter().map(|p| (p.user_id.as_str(), p)).collect();
    for profile in profiles.iter().filter(|p| p.is_matched()) {
        let partner_id = profile.current_match_id.as_deref().unwrap();
        let partner = by_id[partner_id];
        assert_eq!(
            partner.current_match_id.as_deref(),
            Some(profile.user_id.as_str()),
            "{} points at {} but not the other way around",
            profile.user_id,
            partner_id
        );
    }
}

fn assert_exclusive(summary: &RunSummary) {
    let mut seen = HashSet::new();
    for pair in &summary.matches {
        assert!(seen.insert(pair.user1.clone()), "{} matched twice", pair.user1);
        assert!(seen.insert(pair.user2.clone()), "{} matched twice", pair.user2);
    }
}

#[tokio::test]
async fn test_integration_end_to_end_matching() {
    let store = InMemoryStore::with_profiles(mixed_pool()).await;

    let summary = rule_based_runner(&store).run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.total_profiles, 12);
    assert_eq!(summary.eligible_users, 12);
    assert!(summary.matches_created > 0);
    assert_eq!(summary.matches_created, summary.matches.len());
    assert_exclusive(&summary);

    let profiles = store.profiles().await;
    assert_symmetric(&profiles);
    assert_eq!(
        profiles.iter().filter(|p| p.is_matched()).count(),
        summary.matches_created * 2
    );
    assert_eq!(store.conversation_count().await, summary.matches_created);

    for pair in &summary.matches {
        assert!(pair.score >= 30);
        let record = store.get_conversation(&pair.user1, &pair.user2).await.unwrap().unwrap();
        assert!(record.messages.is_empty());
        assert_eq!(record.match_score, Some(pair.score));
    }

    let runs = store.list_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, summary.run_id);
    assert_eq!(runs[0].active_users, 12);
}

#[tokio::test]
async fn test_rerun_creates_no_new_matches() {
    let store = InMemoryStore::with_profiles(mixed_pool()).await;
    let runner = rule_based_runner(&store);

    let first = runner.run(RunOptions::default()).await.unwrap();
    let writes_after_first = store.write_count();
    let second = runner.run(RunOptions::default()).await.unwrap();

    assert!(first.matches_created > 0);
    assert_eq!(second.matches_created, 0);
    assert_eq!(store.write_count(), writes_after_first);
    assert_eq!(store.list_runs().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_same_gender_pool_never_matched() {
    let store = InMemoryStore::with_profiles(vec![
        create_test_profile("w1", 30, "female", &[("religion", "Christian")]),
        create_test_profile("w2", 31, "F", &[("religion", "Christian")]),
        create_test_profile("w3", 29, "woman", &[("religion", "Christian")]),
    ])
    .await;

    let summary = rule_based_runner(&store).run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.eligible_users, 3);
    assert_eq!(summary.matches_created, 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_rejection_is_permanent_across_runs() {
    let mut man = create_test_profile("m", 30, "male", &[("religion", "Christian"), ("location", "Denver")]);
    man.rejected_matches.insert("w".to_string());
    let woman = create_test_profile("w", 30, "female", &[("religion", "Christian"), ("location", "Denver")]);
    let store = InMemoryStore::with_profiles(vec![man, woman]).await;
    let runner = rule_based_runner(&store);

    for _ in 0..3 {
        let summary = runner.run(RunOptions::default()).await.unwrap();
        assert_eq!(summary.matches_created, 0);
    }
}

#[tokio::test]
async fn test_rejected_pair_not_proposed_again() {
    let store = InMemoryStore::with_profiles(vec![
        create_test_profile("m", 30, "male", &[("religion", "Christian")]),
        create_test_profile("w", 30, "female", &[("religion", "Christian")]),
    ])
    .await;
    let runner = rule_based_runner(&store);
    let interactions = MatchInteractions::new(Arc::new(store.clone()));

    let first = runner.run(RunOptions::default()).await.unwrap();
    assert_eq!(first.matches_created, 1);

    interactions.reject_match("w").await.unwrap();
    let second = runner.run(RunOptions::default()).await.unwrap();

    assert_eq!(second.eligible_users, 2);
    assert_eq!(second.matches_created, 0);
}

#[tokio::test]
async fn test_scenario_single_profile_is_insufficient_pool() {
    let store = InMemoryStore::with_profiles(vec![
        create_test_profile("m", 30, "male", &[]),
        {
            let mut inactive = create_test_profile("w", 30, "female", &[]);
            inactive.matching_active = false;
            inactive
        },
    ])
    .await;

    let summary = rule_based_runner(&store).run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.eligible_users, 1);
    assert_eq!(summary.matches_created, 0);
    assert_eq!(summary.reason.as_deref(), Some(INSUFFICIENT_POOL));
}

#[tokio::test]
async fn test_scenario_dry_run_matches_real_run() {
    let dry_store = InMemoryStore::with_profiles(mixed_pool()).await;
    let real_store = InMemoryStore::with_profiles(mixed_pool()).await;

    let dry = rule_based_runner(&dry_store)
        .run(RunOptions { dry_run: true, verbose: false })
        .await
        .unwrap();
    let real = rule_based_runner(&real_store).run(RunOptions::default()).await.unwrap();

    assert_eq!(dry_store.write_count(), 0);
    assert!(dry_store.list_runs().await.unwrap().is_empty());
    assert!(dry_store.profiles().await.iter().all(|p| !p.is_matched()));

    assert!(dry.dry_run);
    assert_eq!(dry.total_profiles, real.total_profiles);
    assert_eq!(dry.eligible_users, real.eligible_users);
    assert_eq!(dry.matches_created, real.matches_created);
    assert_eq!(dry.matches, real.matches);
}

struct TimingOutBackend;

#[async_trait]
impl CompletionBackend for TimingOutBackend {
    async fn complete(&self, _prompt: &str) -> Result<String, ScoringBackendError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Err(ScoringBackendError::Api("unreachable".to_string()))
    }
}

#[tokio::test]
async fn test_scenario_backend_timeouts_fall_back() {
    let store = InMemoryStore::with_profiles(vec![
        create_test_profile("m", 30, "male", &[("religion", "Christian"), ("location", "Denver")]),
        create_test_profile("w", 31, "female", &[("religion", "Christian"), ("location", "Denver")]),
    ])
    .await;
    let scorer = CompatibilityScorer::new(
        Some(Arc::new(TimingOutBackend)),
        ScoringWeights::default(),
        Duration::from_millis(20),
    );
    let engine = PairingEngine::new(scorer, MatchStateUpdater::new(Arc::new(store.clone())));
    let runner = BatchRunner::new(Arc::new(store.clone()), Arc::new(store.clone()), engine);

    let summary = runner.run(RunOptions { dry_run: false, verbose: true }).await.unwrap();

    assert_eq!(summary.matches_created, 1);
    assert_eq!(summary.matches[0].score, 100);
    let sources: Vec<ScoreSource> = summary
        .decisions
        .iter()
        .filter_map(|d| match d {
            CandidateDecision::Scored { source, .. } => Some(*source),
            _ => None,
        })
        .collect();
    assert!(!sources.is_empty());
    assert!(sources.iter().all(|s| *s == ScoreSource::RuleBased));
}

#[tokio::test]
async fn test_assisted_scoring_over_http() {
    let mut server = mockito::Server::new_async().await;
    let verdict = r#"```json\n{\"score\": 88, \"reasoning\": \"Aligned on faith and family.\", \"strengths\": \"values\", \"concerns\": \"None identified\"}\n```"#;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"content": [{{"type": "text", "text": "{}"}}]}}"#, verdict))
        .expect(1)
        .create_async()
        .await;

    let client = HttpCompletionClient::new(
        BackendProvider::Anthropic,
        Some(format!("{}/v1/messages", server.url())),
        Some("test_key".to_string()),
        "test-model".to_string(),
        512,
        Duration::from_secs(5),
    )
    .unwrap();

    let store = InMemoryStore::with_profiles(vec![
        create_test_profile("m", 30, "male", &[("religion", "Hindu")]),
        create_test_profile("w", 45, "female", &[("religion", "Christian")]),
    ])
    .await;
    let scorer = CompatibilityScorer::new(Some(Arc::new(client)), ScoringWeights::default(), Duration::from_secs(5))
        .with_cache(lovedash_match::services::ScoreCache::new(100, 60));
    let engine = PairingEngine::new(scorer, MatchStateUpdater::new(Arc::new(store.clone())));
    let runner = BatchRunner::new(Arc::new(store.clone()), Arc::new(store.clone()), engine);

    let summary = runner.run(RunOptions::default()).await.unwrap();

    // Rule-based scoring would have rejected this pair outright
    assert_eq!(summary.matches_created, 1);
    assert_eq!(summary.matches[0].score, 88);
    let record = store.get_conversation("m", "w").await.unwrap().unwrap();
    assert_eq!(record.reasoning.as_deref(), Some("Aligned on faith and family."));
    mock.assert_async().await;
}

/// Wraps the in-memory store to simulate concurrent writers and flaky storage
struct FlakyStore {
    inner: InMemoryStore,
    stale_reads: HashSet<String>,
    fail_conversations: bool,
}

#[async_trait]
impl ProfileStore for FlakyStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let mut profile = self.inner.get_profile(user_id).await?;
        if self.stale_reads.contains(user_id) {
            if let Some(profile) = profile.as_mut() {
                profile.version = profile.version.saturating_sub(1);
            }
        }
        Ok(profile)
    }

    async fn list_profile_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.list_profile_ids().await
    }

    async fn put_profile(&self, profile: &Profile, expected_version: u64) -> StoreResult<u64> {
        self.inner.put_profile(profile, expected_version).await
    }

    async fn get_conversation(&self, user_a: &str, user_b: &str) -> StoreResult<Option<MatchRecord>> {
        self.inner.get_conversation(user_a, user_b).await
    }

    async fn put_conversation(&self, record: &MatchRecord) -> StoreResult<()> {
        if self.fail_conversations {
            return Err(StoreError::Unavailable("chat storage offline".to_string()));
        }
        self.inner.put_conversation(record).await
    }
}

fn flaky_runner(store: Arc<FlakyStore>, log: &InMemoryStore) -> BatchRunner {
    let engine = PairingEngine::new(
        CompatibilityScorer::rule_based(ScoringWeights::default()),
        MatchStateUpdater::new(store.clone()),
    );
    BatchRunner::new(store, Arc::new(log.clone()), engine)
}

#[tokio::test]
async fn test_version_conflict_abandons_pairing() {
    let mut man = create_test_profile("a-man", 30, "male", &[("religion", "Christian")]);
    man.version = 3;
    let woman = create_test_profile("b-woman", 30, "female", &[("religion", "Christian")]);
    let inner = InMemoryStore::with_profiles(vec![man, woman]).await;
    let store = Arc::new(FlakyStore {
        inner: inner.clone(),
        stale_reads: HashSet::from(["a-man".to_string()]),
        fail_conversations: false,
    });

    let summary = flaky_runner(store, &inner).run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.matches_created, 0);
    assert_eq!(summary.abandoned_pairings, 1);
    assert!(inner.profiles().await.iter().all(|p| !p.is_matched()));
}

#[tokio::test]
async fn test_half_match_is_surfaced() {
    let inner = InMemoryStore::with_profiles(vec![
        create_test_profile("a-man", 30, "male", &[("religion", "Christian")]),
        create_test_profile("b-woman", 30, "female", &[("religion", "Christian")]),
    ])
    .await;
    inner.fail_writes_for("b-woman").await;

    let summary = rule_based_runner(&inner).run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.matches_created, 0);
    assert_eq!(summary.half_matches.len(), 1);
    assert_eq!(summary.half_matches[0].written_id, "a-man");
    assert_eq!(summary.half_matches[0].failed_id, "b-woman");

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["half_matches"][0]["failed_id"], "b-woman");
}

#[tokio::test]
async fn test_conversation_failure_keeps_match() {
    let inner = InMemoryStore::with_profiles(vec![
        create_test_profile("a-man", 30, "male", &[("religion", "Christian")]),
        create_test_profile("b-woman", 30, "female", &[("religion", "Christian")]),
    ])
    .await;
    let store = Arc::new(FlakyStore {
        inner: inner.clone(),
        stale_reads: HashSet::new(),
        fail_conversations: true,
    });

    let summary = flaky_runner(store, &inner).run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.matches_created, 1);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("a-man_b-woman"));
    assert_symmetric(&inner.profiles().await);
}

#[tokio::test]
async fn test_json_file_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());
    for profile in mixed_pool() {
        store.put_profile(&profile, 0).await.unwrap();
    }

    let engine = PairingEngine::new(
        CompatibilityScorer::rule_based(ScoringWeights::default()),
        MatchStateUpdater::new(store.clone()),
    );
    let summary = BatchRunner::new(store.clone(), store.clone(), engine)
        .run(RunOptions::default())
        .await
        .unwrap();

    assert!(summary.matches_created > 0);
    assert_exclusive(&summary);

    let mut profiles = Vec::new();
    for id in store.list_profile_ids().await.unwrap() {
        profiles.push(store.get_profile(&id).await.unwrap().unwrap());
    }
    assert_symmetric(&profiles);

    let first = &summary.matches[0];
    let key = MatchRecord::key_for(&first.user1, &first.user2);
    assert!(dir.path().join("match_chats").join(format!("{}.json", key)).exists());
    assert!(dir.path().join("matching_logs.json").exists());
    assert_eq!(store.list_runs().await.unwrap().len(), 1);
}
