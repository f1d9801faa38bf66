use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::EMBEDDING_DIMS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
        }
    }
}

fn default_max_tokens() -> usize {
    1024
}
fn default_overlap() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenizerConfig {
    /// Local `tokenizer.json`; takes precedence over the Hugging Face download.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_tokenizer_repo")]
    pub repo: String,
    #[serde(default = "default_tokenizer_file")]
    pub file: String,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            path: None,
            repo: default_tokenizer_repo(),
            file: default_tokenizer_file(),
            cache_dir: None,
        }
    }
}

fn default_tokenizer_repo() -> String {
    // cl100k_base in Hugging Face tokenizer.json form
    "Xenova/gpt-4".to_string()
}
fn default_tokenizer_file() -> String {
    "tokenizer.json".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            url: default_embedding_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    EMBEDDING_DIMS
}
fn default_embedding_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}
fn default_max_retries() -> u32 {
    0
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// API root; the model path and `:generateContent` are appended.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_llm_model() -> String {
    "gemini-1.5-pro-latest".to_string()
}
fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_output_tokens() -> u32 {
    4096
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Question words must be strictly longer than this to act as keywords.
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            top_k: default_top_k(),
            min_keyword_len: default_min_keyword_len(),
        }
    }
}

fn default_pool_size() -> usize {
    50
}
fn default_top_k() -> usize {
    10
}
fn default_min_keyword_len() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_include_extensions")]
    pub include_extensions: Vec<String>,
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            include_extensions: default_include_extensions(),
            exclude_dirs: default_exclude_dirs(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_include_extensions() -> Vec<String> {
    [".py", ".js", ".java", ".cpp", ".ts", ".tsx", ".md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_exclude_dirs() -> Vec<String> {
    vec![".git".to_string(), "node_modules".to_string()]
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
    "127.0.0.1:8787".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check the invariants the pipeline relies on.
///
/// Called by [`load_config`]; exposed for configs built in code.
pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.max_tokens {
        bail!(
            "chunking.overlap_tokens ({}) must be smaller than chunking.max_tokens ({})",
            config.chunking.overlap_tokens,
            config.chunking.max_tokens
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.pool_size < config.retrieval.top_k {
        bail!(
            "retrieval.pool_size ({}) must be >= retrieval.top_k ({})",
            config.retrieval.pool_size,
            config.retrieval.top_k
        );
    }

    // Validate embedding
    if config.embedding.dims != EMBEDDING_DIMS {
        bail!(
            "embedding.dims must be {} (got {})",
            EMBEDDING_DIMS,
            config.embedding.dims
        );
    }
    match config.embedding.provider.as_str() {
        "disabled" | "hash" => {}
        "openai" => {
            if config.embedding.model.is_none() {
                bail!("embedding.model must be specified when provider is 'openai'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, or openai.",
            other
        ),
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "disabled" | "gemini" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    if config.ingest.concurrency == 0 {
        bail!("ingest.concurrency must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse("[db]\npath = \"data/rqa.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.max_tokens, 1024);
        assert_eq!(config.chunking.overlap_tokens, 256);
        assert_eq!(config.retrieval.pool_size, 50);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.embedding.dims, 768);
        assert_eq!(config.llm.temperature, 0.3);
        assert!(config.ingest.include_extensions.contains(&".py".to_string()));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let err = parse(
            "[db]\npath = \"x.sqlite\"\n[chunking]\nmax_tokens = 256\noverlap_tokens = 256\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap_tokens"));
    }

    #[test]
    fn test_wrong_dims_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[embedding]\nprovider = \"hash\"\ndims = 384\n")
            .unwrap_err();
        assert!(err.to_string().contains("768"));
    }

    #[test]
    fn test_openai_requires_model() {
        let err =
            parse("[db]\npath = \"x.sqlite\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_pool_smaller_than_top_k_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[retrieval]\npool_size = 5\ntop_k = 10\n")
            .unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn test_unknown_llm_provider_rejected() {
        let err = parse("[db]\npath = \"x.sqlite\"\n[llm]\nprovider = \"mystery\"\n").unwrap_err();
        assert!(err.to_string().contains("llm provider"));
    }
}
