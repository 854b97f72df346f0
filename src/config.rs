//! Environment-driven configuration for every component.
//!
//! Settings are resolved once at process start (`.env` is honored via
//! [`dotenvy`]) and shared by reference; nothing reads the environment after
//! startup.

use std::path::PathBuf;
use std::time::Duration;

/// Retrieval and citation parameters for one orchestration run.
#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    /// Number of nearest chunks requested from the vector index.
    pub top_k: usize,
    /// Minimum similarity score a hit must reach to be cited outright.
    pub score_floor: f32,
    /// Upper bound on citations included in a prompt.
    pub max_citations: usize,
    /// Upper bound, in characters, on a citation excerpt.
    pub excerpt_max_chars: usize,
    /// How long to wait for a stream subscriber before proceeding anyway.
    pub subscriber_wait: Duration,
    /// Poll interval used during the bounded subscriber wait.
    pub poll_interval: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_floor: 0.65,
            max_citations: 5,
            excerpt_max_chars: 1000,
            subscriber_wait: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Chunking windows for the ingestion pipeline.
///
/// Word windows apply to web pages; character windows apply per PDF page.
/// Overlap keeps boundary-straddling sentences retrievable from both sides.
#[derive(Clone, Debug)]
pub struct ChunkingConfig {
    pub word_window: usize,
    pub word_overlap: usize,
    pub page_window_chars: usize,
    pub page_overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            word_window: 400,
            word_overlap: 50,
            page_window_chars: 2000,
            page_overlap_chars: 200,
        }
    }
}

/// Process-wide settings, resolved from the environment with defaults.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// SQLite connection string for the relational store.
    pub database_url: String,
    /// Directory for uploaded PDF files.
    pub upload_dir: PathBuf,
    /// Base URL of the vector index HTTP API.
    pub vector_url: String,
    /// Collection holding document chunk vectors.
    pub collection: String,
    /// Dimensionality of the embedding vectors.
    pub vector_dim: usize,
    /// Base URL of the embedding service.
    pub embed_url: String,
    /// Embedding model name.
    pub embed_model: String,
    /// Base URL of the OpenAI-compatible chat completion API.
    pub llm_url: String,
    /// Chat model name.
    pub llm_model: String,
    /// Optional bearer token for the chat API.
    pub llm_api_key: Option<String>,
    /// Broadcast buffer capacity per conversation channel.
    pub event_capacity: usize,
    /// Number of ingestion worker tasks.
    pub ingest_workers: usize,
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            database_url: "sqlite://ragline.db".to_string(),
            upload_dir: PathBuf::from("data/uploads"),
            vector_url: "http://localhost:6333".to_string(),
            collection: "documents_chunks".to_string(),
            vector_dim: 768,
            embed_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            llm_url: "http://localhost:11434/v1".to_string(),
            llm_model: "llama3.1".to_string(),
            llm_api_key: None,
            event_capacity: 1024,
            ingest_workers: 1,
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from the environment, falling back to defaults.
    ///
    /// Loads `.env` first so local overrides work without exported variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        let retrieval_defaults = RetrievalConfig::default();
        let chunking_defaults = ChunkingConfig::default();

        Self {
            bind_addr: env_or("RAGLINE_BIND_ADDR", &defaults.bind_addr),
            database_url: env_or("DATABASE_URL", &defaults.database_url),
            upload_dir: PathBuf::from(env_or(
                "RAGLINE_UPLOAD_DIR",
                &defaults.upload_dir.to_string_lossy(),
            )),
            vector_url: env_or("VECTOR_INDEX_URL", &defaults.vector_url),
            collection: env_or("VECTOR_COLLECTION", &defaults.collection),
            vector_dim: env_parse("VECTOR_DIM", defaults.vector_dim),
            embed_url: env_or("EMBEDDING_URL", &defaults.embed_url),
            embed_model: env_or("EMBEDDING_MODEL", &defaults.embed_model),
            llm_url: env_or("LLM_URL", &defaults.llm_url),
            llm_model: env_or("LLM_MODEL", &defaults.llm_model),
            llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|v| !v.is_empty()),
            event_capacity: env_parse("RAGLINE_EVENT_CAPACITY", defaults.event_capacity),
            ingest_workers: env_parse("RAGLINE_INGEST_WORKERS", defaults.ingest_workers).max(1),
            retrieval: RetrievalConfig {
                top_k: env_parse("RETRIEVAL_TOP_K", retrieval_defaults.top_k),
                score_floor: env_parse("RETRIEVAL_SCORE_FLOOR", retrieval_defaults.score_floor),
                max_citations: env_parse("MAX_CITATIONS", retrieval_defaults.max_citations),
                excerpt_max_chars: env_parse(
                    "CITATION_EXCERPT_CHARS",
                    retrieval_defaults.excerpt_max_chars,
                ),
                subscriber_wait: Duration::from_millis(env_parse(
                    "SUBSCRIBER_WAIT_MS",
                    retrieval_defaults.subscriber_wait.as_millis() as u64,
                )),
                poll_interval: Duration::from_millis(env_parse(
                    "SUBSCRIBER_POLL_MS",
                    retrieval_defaults.poll_interval.as_millis() as u64,
                )),
            },
            chunking: ChunkingConfig {
                word_window: env_parse("CHUNK_WORD_WINDOW", chunking_defaults.word_window),
                word_overlap: env_parse("CHUNK_WORD_OVERLAP", chunking_defaults.word_overlap),
                page_window_chars: env_parse(
                    "CHUNK_PAGE_WINDOW",
                    chunking_defaults.page_window_chars,
                ),
                page_overlap_chars: env_parse(
                    "CHUNK_PAGE_OVERLAP",
                    chunking_defaults.page_overlap_chars,
                ),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.top_k, 5);
        assert_eq!(retrieval.max_citations, 5);
        assert!((retrieval.score_floor - 0.65).abs() < f32::EPSILON);
        assert_eq!(retrieval.subscriber_wait, Duration::from_secs(2));

        let chunking = ChunkingConfig::default();
        assert_eq!(chunking.word_window, 400);
        assert_eq!(chunking.word_overlap, 50);
        assert_eq!(chunking.page_window_chars, 2000);
        assert_eq!(chunking.page_overlap_chars, 200);
    }
}
