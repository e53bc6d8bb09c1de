use clap::Parser;
use lovedash_match::config::{LoggingSettings, Settings};
use lovedash_match::core::{
    BatchError, BatchRunner, CompatibilityScorer, MatchStateUpdater, PairingEngine, DEFAULT_BACKEND_TIMEOUT,
};
use lovedash_match::models::{RunOptions, RunSummary};
use lovedash_match::services::{CompletionBackend, HttpCompletionClient, JsonFileStore, ScoreCache};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pair eligible LoveDash profiles and record the run
#[derive(Parser, Debug)]
#[command(name = "lovedash-match", version, about)]
struct Cli {
    /// Compute pairings without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Record a per-candidate decision trace and log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (environment variables still override it)
    #[arg(long, env = "LOVEDASH_CONFIG")]
    config: Option<PathBuf>,
}

fn load_settings(cli: &Cli) -> Result<Settings, BatchError> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    Ok(settings)
}

/// LOG_LEVEL / LOG_FORMAT override the configured values. Logs go to stderr
/// so stdout carries only the run summary.
fn init_logging(logging: &LoggingSettings, verbose: bool) {
    let log_level = if verbose {
        "debug".to_string()
    } else {
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone())
    };
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn build_backend(settings: &Settings) -> Option<Arc<dyn CompletionBackend>> {
    let Some(backend) = &settings.scoring.backend else {
        info!("No scoring backend configured, using rule-based scoring");
        return None;
    };

    match HttpCompletionClient::new(
        backend.provider,
        backend.endpoint.clone(),
        backend.api_key.clone(),
        backend.model.clone(),
        backend.max_tokens,
        Duration::from_secs(backend.timeout_secs),
    ) {
        Ok(client) => {
            info!("Scoring backend initialized ({:?}, model {})", backend.provider, backend.model);
            Some(Arc::new(client) as Arc<dyn CompletionBackend>)
        }
        Err(e) => {
            warn!("Scoring backend unavailable, using rule-based scoring only: {}", e);
            None
        }
    }
}

async fn run(settings: Settings, options: RunOptions) -> Result<RunSummary, BatchError> {
    let store = Arc::new(JsonFileStore::open(settings.storage.data_dir.clone()).await?);
    info!("Profile store opened at {}", store.root().display());

    let timeout = settings
        .scoring
        .backend
        .as_ref()
        .map(|b| Duration::from_secs(b.timeout_secs))
        .unwrap_or(DEFAULT_BACKEND_TIMEOUT);

    let cache = ScoreCache::new(settings.scoring.cache_capacity, settings.scoring.cache_ttl_secs);
    let scorer = CompatibilityScorer::new(build_backend(&settings), (&settings.scoring.weights).into(), timeout)
        .with_cache(cache.clone());

    let engine = PairingEngine::new(scorer, MatchStateUpdater::new(store.clone()))
        .with_min_score(settings.matching.min_score)
        .with_scoring_concurrency(settings.matching.scoring_concurrency);

    info!(
        "Pairing engine initialized (min score {}, scoring concurrency {})",
        settings.matching.min_score, settings.matching.scoring_concurrency
    );

    let summary = BatchRunner::new(store.clone(), store, engine).run(options).await?;

    info!("Score cache holds {} pair verdicts", cache.stats().await.entries);
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => {
            init_logging(&settings.logging, cli.verbose);
            settings
        }
        Err(e) => {
            init_logging(&LoggingSettings::default(), cli.verbose);
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting LoveDash matching run...");

    let options = RunOptions {
        dry_run: cli.dry_run,
        verbose: cli.verbose,
    };

    let summary = match run(settings, options).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Matching run failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize run summary: {}", e);
            ExitCode::FAILURE
        }
    }
}
