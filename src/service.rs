//! Query and ingestion service.
//!
//! [`RagService`] owns the shared collaborators (tokenizer, embedder, vector
//! store, language model) and the tuning parameters, and exposes the two
//! request flows used by the CLI and the HTTP server:
//!
//! - **ingest**: repository source → chunk → embed → upsert;
//! - **ask**: question → embed → retrieve → synthesize → evaluate.
//!
//! All collaborators sit behind `Arc<dyn Trait>` so a single service can be
//! shared across request handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::chunk::ChunkParams;
use crate::config::{Config, IngestConfig};
use crate::db;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::ingest::{ingest, IngestContext, IngestLocks};
use crate::llm::{create_llm, LlmProvider};
use crate::metrics::evaluate;
use crate::migrate;
use crate::models::{self, IngestReport, Metrics, RepositorySource, SourceRef, EMBEDDING_DIMS};
use crate::retrieve::{retrieve, RetrievalParams, Variant};
use crate::source;
use crate::store::{SqliteVectorStore, VectorStore};
use crate::synth::{synthesize, FALLBACK_ANSWER};
use crate::tokenizer::{self, TokenCodec};

pub struct RagService {
    codec: Arc<dyn TokenCodec>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    chunk_params: ChunkParams,
    retrieval: RetrievalParams,
    ingest_config: IngestConfig,
    locks: IngestLocks,
}

impl RagService {
    /// Assemble a service from explicit collaborators, with default tuning.
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            codec,
            embedder,
            store,
            llm,
            chunk_params: ChunkParams::default(),
            retrieval: RetrievalParams::default(),
            ingest_config: IngestConfig::default(),
            locks: IngestLocks::new(),
        }
    }

    pub fn with_chunk_params(mut self, params: ChunkParams) -> Self {
        self.chunk_params = params;
        self
    }

    pub fn with_retrieval(mut self, params: RetrievalParams) -> Self {
        self.retrieval = params;
        self
    }

    pub fn with_ingest_config(mut self, config: IngestConfig) -> Self {
        self.ingest_config = config;
        self
    }

    /// Build the production service: SQLite store, shared tokenizer, and
    /// the configured embedding and LLM adapters.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(pool));

        let codec = tokenizer::shared(&config.tokenizer).await?;
        let embedder = create_provider(&config.embedding)?;
        let llm = create_llm(&config.llm)?;

        Ok(Self::new(codec, embedder, store, llm)
            .with_chunk_params(ChunkParams::from_config(&config.chunking)?)
            .with_retrieval(RetrievalParams::from_config(&config.retrieval))
            .with_ingest_config(config.ingest.clone()))
    }

    /// Index an already-collected set of files.
    pub async fn ingest_files(&self, source: &RepositorySource) -> RagResult<IngestReport> {
        let _guard = self.locks.acquire(&source.repository_id)?;
        self.run_ingest(source).await
    }

    /// Clone a GitHub repository and index it.
    ///
    /// The repository slot is claimed before cloning so a duplicate request
    /// fails without doing any network work.
    pub async fn ingest_url(&self, url: &str, token: Option<String>) -> RagResult<IngestReport> {
        source::validate_github_url(url).map_err(|e| RagError::InvalidInput(e.to_string()))?;
        let repository_id = source::repository_id_for(url);
        let _guard = self.locks.acquire(&repository_id)?;

        let url = url.to_string();
        let config = self.ingest_config.clone();
        let repo = tokio::task::spawn_blocking(move || {
            source::fetch_github_repository(&url, token.as_deref(), &config)
        })
        .await
        .map_err(|e| RagError::Source(anyhow!("clone task failed: {}", e)))?
        .map_err(RagError::Source)?;

        self.run_ingest(&repo).await
    }

    /// Index a local checkout.
    pub async fn ingest_path(&self, root: &Path) -> RagResult<IngestReport> {
        let root: PathBuf = root.to_path_buf();
        let config = self.ingest_config.clone();
        let repo = tokio::task::spawn_blocking(move || source::local_repository(&root, &config))
            .await
            .map_err(|e| RagError::Source(anyhow!("scan task failed: {}", e)))?
            .map_err(RagError::Source)?;

        let _guard = self.locks.acquire(&repo.repository_id)?;
        self.run_ingest(&repo).await
    }

    async fn run_ingest(&self, source: &RepositorySource) -> RagResult<IngestReport> {
        let ctx = IngestContext {
            codec: Arc::clone(&self.codec),
            embedder: self.embedder.as_ref(),
            store: self.store.as_ref(),
            params: self.chunk_params,
            concurrency: self.ingest_config.concurrency,
        };
        ingest(&ctx, source).await
    }

    /// Answer `question` from the indexed content of `repository_id`.
    ///
    /// `variant` must be `"base"` or `"filtered"`. When retrieval finds
    /// nothing, a fixed answer is returned with zero metrics and the model
    /// is not called.
    pub async fn ask(
        &self,
        repository_id: &str,
        question: &str,
        variant: &str,
    ) -> RagResult<models::RagResult> {
        if repository_id.trim().is_empty() {
            return Err(RagError::InvalidInput("repo_id must not be empty".into()));
        }
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".into()));
        }
        let variant: Variant = variant.parse()?;

        let question_vec = self
            .embedder
            .embed(question)
            .await
            .map_err(|source| RagError::Embedding {
                operation: "embed question",
                source,
            })?;
        if question_vec.len() != EMBEDDING_DIMS {
            return Err(RagError::Embedding {
                operation: "embed question",
                source: anyhow!(
                    "expected {} dimensions, got {}",
                    EMBEDDING_DIMS,
                    question_vec.len()
                ),
            });
        }

        let candidates = retrieve(
            self.store.as_ref(),
            question,
            &question_vec,
            repository_id,
            variant,
            &self.retrieval,
        )
        .await?;

        if candidates.is_empty() {
            info!(%repository_id, %variant, "no candidates retrieved");
            return Ok(models::RagResult {
                answer: FALLBACK_ANSWER.to_string(),
                metrics: Metrics::empty(),
                sources: Vec::new(),
            });
        }

        let answer = synthesize(self.llm.as_ref(), question, &candidates).await?;
        let metrics =
            evaluate(self.codec.as_ref(), &answer, &candidates).map_err(RagError::Tokenizer)?;

        info!(
            %repository_id,
            %variant,
            chunks = metrics.num_chunks_retrieved,
            context_relevance = metrics.context_relevance,
            groundedness = metrics.groundedness,
            "answered question"
        );

        Ok(models::RagResult {
            answer,
            metrics,
            sources: candidates
                .into_iter()
                .map(|c| SourceRef {
                    file_path: c.file_path,
                    distance: c.distance,
                })
                .collect(),
        })
    }
}
