//! TOML configuration parsing and validation.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the two co-located index artifacts.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Sentences per chunk window.
    #[serde(default = "default_window_sentences")]
    pub window_sentences: usize,
    /// Sentences shared between successive windows.
    #[serde(default = "default_overlap_sentences")]
    pub overlap_sentences: usize,
    /// Sections with fewer words than this produce no chunks.
    #[serde(default = "default_min_words")]
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_sentences: default_window_sentences(),
            overlap_sentences: default_overlap_sentences(),
            min_words: default_min_words(),
        }
    }
}

fn default_window_sentences() -> usize {
    5
}
fn default_overlap_sentences() -> usize {
    1
}
fn default_min_words() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Final number of related sections returned.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Over-fetch multiplier: `k = top_n × overfetch_factor` candidates
    /// are searched so per-section de-duplication has room to work.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    /// Upper bound on snippet length in characters.
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            overfetch_factor: default_overfetch_factor(),
            snippet_max_chars: default_snippet_max_chars(),
        }
    }
}

fn default_top_n() -> usize {
    5
}
fn default_overfetch_factor() -> usize {
    3
}
fn default_snippet_max_chars() -> usize {
    360
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"ollama"`.
    pub provider: String,
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    pub model: String,
    /// Vector dimensionality produced by the model.
    pub dims: usize,
    /// Endpoint override (Ollama only).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.window_sentences == 0 {
        anyhow::bail!("chunking.window_sentences must be > 0");
    }
    if config.chunking.overlap_sentences >= config.chunking.window_sentences {
        anyhow::bail!("chunking.overlap_sentences must be < chunking.window_sentences");
    }

    if config.retrieval.top_n == 0 {
        anyhow::bail!("retrieval.top_n must be >= 1");
    }
    if config.retrieval.overfetch_factor == 0 {
        anyhow::bail!("retrieval.overfetch_factor must be >= 1");
    }
    if config.retrieval.snippet_max_chars == 0 {
        anyhow::bail!("retrieval.snippet_max_chars must be > 0");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    Ok(())
}
