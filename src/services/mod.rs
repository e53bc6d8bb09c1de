// Service exports
pub mod cache;
pub mod file_store;
pub mod llm;
pub mod memory;
pub mod store;

pub use cache::{CacheKey, CacheStats, ScoreCache};
pub use file_store::JsonFileStore;
pub use llm::{BackendProvider, CompletionBackend, HttpCompletionClient, ScoringBackendError};
pub use memory::InMemoryStore;
pub use store::{ProfileStore, RunLogSink, StoreError, StoreResult};
