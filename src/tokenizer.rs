//! Deterministic subword tokenizer shared by chunking and metrics.
//!
//! The same vocabulary must be used for every chunking and groundedness
//! computation, so the process holds exactly one tokenizer. It is loaded
//! lazily on first use (on a blocking thread, since loading may download
//! `tokenizer.json`) and then shared read-only behind an [`Arc`].
//!
//! The default vocabulary is `cl100k_base` in Hugging Face `tokenizer.json`
//! form (`Xenova/gpt-4`). A local file can be configured instead via
//! `[tokenizer] path`.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::TokenizerConfig;

/// Encode/decode between text and token ids.
///
/// Implementations must be deterministic: the same text always yields the
/// same ids, and decoding is a pure function of the ids.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// [`TokenCodec`] backed by the Hugging Face `tokenizers` crate.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer").finish()
    }
}

impl HfTokenizer {
    /// Load from a `tokenizer.json`, with padding and truncation disabled so
    /// token counts reflect the raw text.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Load tokenizer {}: {}", path.display(), e))?;
        inner.with_padding(None);
        inner
            .with_truncation(None)
            .map_err(|e| anyhow!("Disable truncation: {}", e))?;
        info!(path = %path.display(), "loaded tokenizer");
        Ok(Self { inner })
    }

    /// Resolve the configured tokenizer file, downloading it into the cache
    /// directory when no local path is set.
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        let path = match &config.path {
            Some(p) => p.clone(),
            None => {
                let cache_path = cache_dir(config)?
                    .join(config.repo.replace('/', "--"))
                    .join(&config.file);
                download_to_cache(&config.repo, &config.file, &cache_path)?;
                cache_path
            }
        };
        Self::from_file(&path)
    }
}

impl TokenCodec for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenize: {}", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| anyhow!("Detokenize: {}", e))
    }
}

fn cache_dir(config: &TokenizerConfig) -> Result<PathBuf> {
    let dir = match &config.cache_dir {
        Some(dir) => dir.clone(),
        None => {
            let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(base)
                .join(".cache")
                .join("repo-qa")
                .join("tokenizers")
        }
    };
    std::fs::create_dir_all(&dir).map_err(|e| anyhow!("Create cache dir: {}", e))?;
    Ok(dir)
}

fn download_to_cache(repo: &str, file: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo,
        file.replace(' ', "%20")
    );
    info!(%url, "downloading tokenizer");
    let resp = reqwest::blocking::get(&url)
        .map_err(|e| anyhow!("Download {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| anyhow!("Download {}: {}", url, e))?;
    let bytes = resp.bytes().map_err(|e| anyhow!("Read body: {}", e))?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| anyhow!("Create cache parent: {}", e))?;
    }
    std::fs::write(cache_path, &bytes).map_err(|e| anyhow!("Write cache: {}", e))?;
    Ok(())
}

static SHARED: OnceCell<Arc<dyn TokenCodec>> = OnceCell::const_new();

/// Process-wide tokenizer handle.
///
/// The first caller loads the tokenizer; concurrent first callers wait for
/// that single load instead of starting their own. Later configs are ignored
/// once a tokenizer is installed.
pub async fn shared(config: &TokenizerConfig) -> Result<Arc<dyn TokenCodec>> {
    let codec = SHARED
        .get_or_try_init(|| async {
            let config = config.clone();
            let tokenizer =
                tokio::task::spawn_blocking(move || HfTokenizer::from_config(&config)).await??;
            Ok::<Arc<dyn TokenCodec>, anyhow::Error>(Arc::new(tokenizer))
        })
        .await?;
    Ok(codec.clone())
}
