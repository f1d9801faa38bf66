//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use repo_qa::chunk::ChunkParams;
use repo_qa::embedding::{EmbeddingProvider, HashEmbedder};
use repo_qa::llm::LlmProvider;
use repo_qa::models::{CandidateRow, EmbeddedChunk, RepositorySource, SourceFile, EMBEDDING_DIMS};
use repo_qa::service::RagService;
use repo_qa::store::VectorStore;
use repo_qa::tokenizer::TokenCodec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ─── Tokenizer ──────────────────────────────────────────────────────

/// One token per `char`; lossless and offline.
pub struct CharCodec;

impl TokenCodec for CharCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.chars().map(|c| c as u32).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        ids.iter()
            .map(|&id| char::from_u32(id).ok_or_else(|| anyhow!("invalid id {}", id)))
            .collect()
    }
}

// ─── LLM ────────────────────────────────────────────────────────────

/// Returns a fixed answer and records every prompt it receives.
pub struct ScriptedLlm {
    answer: String,
    fail: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::answering("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _system_instruction: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            bail!("Gemini API error 500: internal");
        }
        Ok(self.answer.clone())
    }
}

// ─── Embedders ──────────────────────────────────────────────────────

/// Returns a vector of the wrong width for every text.
pub struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    fn model_name(&self) -> &str {
        "short"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.5, 0.5, 0.5])
    }
}

/// Fails every request, like an unreachable embedding endpoint.
pub struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    fn model_name(&self) -> &str {
        "unavailable"
    }
    fn dims(&self) -> usize {
        EMBEDDING_DIMS
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("connection refused")
    }
}

// ─── Vector store ───────────────────────────────────────────────────

/// A store whose writes and/or searches fail.
pub struct BrokenStore {
    pub fail_upsert: bool,
    pub fail_search: bool,
    upserts: AtomicUsize,
}

impl BrokenStore {
    pub fn rejecting_writes() -> Self {
        Self {
            fail_upsert: true,
            fail_search: false,
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn rejecting_searches() -> Self {
        Self {
            fail_upsert: false,
            fail_search: true,
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for BrokenStore {
    async fn upsert(&self, _chunk: &EmbeddedChunk) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert {
            bail!("disk I/O error");
        }
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        _query: &[f32],
        _repository_id: &str,
        _k: usize,
    ) -> Result<Vec<CandidateRow>> {
        if self.fail_search {
            bail!("database is locked");
        }
        Ok(Vec::new())
    }

    async fn count(&self, _repository_id: &str) -> Result<usize> {
        Ok(0)
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

pub fn service(store: Arc<dyn VectorStore>, llm: Arc<ScriptedLlm>) -> RagService {
    service_with_embedder(Arc::new(HashEmbedder::new(EMBEDDING_DIMS)), store, llm)
}

pub fn service_with_embedder(
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    llm: Arc<ScriptedLlm>,
) -> RagService {
    RagService::new(Arc::new(CharCodec), embedder, store, llm)
        .with_chunk_params(ChunkParams::new(64, 16).unwrap())
}

pub fn repository(id: &str, files: &[(&str, &str)]) -> RepositorySource {
    RepositorySource {
        repository_id: id.to_string(),
        files: files
            .iter()
            .map(|(path, text)| SourceFile {
                path: path.to_string(),
                text: text.to_string(),
            })
            .collect(),
    }
}

/// `count` single-chunk files, none of which share words with a question
/// about networking.
pub fn uniform_repository(id: &str, count: usize) -> RepositorySource {
    let files: Vec<(String, String)> = (0..count)
        .map(|i| {
            (
                format!("src/handler_{:02}.rs", i),
                format!("fn handler_{}(req: Request) -> Response {{ Response::ok() }}", i),
            )
        })
        .collect();
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, t)| (p.as_str(), t.as_str()))
        .collect();
    repository(id, &borrowed)
}

/// Ten single-chunk files; only `src/auth.py` mentions authentication.
pub fn ten_file_repository(id: &str) -> RepositorySource {
    let mut files: Vec<(String, String)> = (0..9)
        .map(|i| {
            (
                format!("src/view_{}.py", i),
                format!("def render_{}(page): return page", i),
            )
        })
        .collect();
    files.push((
        "src/auth.py".to_string(),
        "# authentication helpers\ndef login(user): return token".to_string(),
    ));
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, t)| (p.as_str(), t.as_str()))
        .collect();
    repository(id, &borrowed)
}
