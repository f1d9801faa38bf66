//! Ingestion pipeline orchestration.
//!
//! Coordinates the indexing flow for one repository: file list → chunking →
//! embedding → vector store. Embedding failures are non-fatal (the chunk is
//! stored with a zero vector); store failures abort the run.
//!
//! Per-chunk embed + upsert work runs with bounded concurrency. Re-running
//! an ingestion overwrites rows in place because every upsert is keyed by
//! the chunk id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::chunk::{chunk_file, ChunkParams};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::models::{
    Chunk, EmbeddedChunk, IngestReport, RepositorySource, SourceFile, EMBEDDING_DIMS,
};
use crate::store::VectorStore;
use crate::tokenizer::TokenCodec;

/// Collaborators and tuning for one ingestion run.
pub struct IngestContext<'a> {
    /// Shared so chunking can run on a blocking thread.
    pub codec: Arc<dyn TokenCodec>,
    pub embedder: &'a dyn EmbeddingProvider,
    pub store: &'a dyn VectorStore,
    pub params: ChunkParams,
    /// Maximum embed + upsert operations in flight.
    pub concurrency: usize,
}

/// Chunk, embed, and store every file of `source`.
pub async fn ingest(ctx: &IngestContext<'_>, source: &RepositorySource) -> RagResult<IngestReport> {
    let repository_id = source.repository_id.as_str();
    if source.files.is_empty() {
        return Err(RagError::NoIngestibleContent {
            repository_id: repository_id.to_string(),
        });
    }

    // Tokenizing a whole repository is CPU-bound; keep it off the runtime.
    let codec = Arc::clone(&ctx.codec);
    let files = source.files.clone();
    let params = ctx.params;
    let owned_id = repository_id.to_string();
    let (chunks, files_skipped) = tokio::task::spawn_blocking(move || {
        chunk_files(codec.as_ref(), &owned_id, &files, &params)
    })
    .await
    .map_err(|e| RagError::Tokenizer(anyhow!("chunking task failed: {}", e)))??;

    let mut total_chunks = 0usize;
    let mut zero_vector_chunks = 0usize;

    let mut pending = stream::iter(chunks.into_iter().map(|chunk| embed_and_store(ctx, chunk)))
        .buffer_unordered(ctx.concurrency.max(1));

    while let Some(outcome) = pending.next().await {
        if outcome? {
            zero_vector_chunks += 1;
        }
        total_chunks += 1;
    }

    info!(
        %repository_id,
        files = source.files.len(),
        files_skipped,
        total_chunks,
        zero_vector_chunks,
        "ingestion complete"
    );

    Ok(IngestReport {
        status: "success",
        repository_id: repository_id.to_string(),
        total_chunks,
        files_seen: source.files.len(),
        files_skipped,
        zero_vector_chunks,
    })
}

/// Chunk every file in order. Returns the chunks and the number of files
/// that produced none.
fn chunk_files(
    codec: &dyn TokenCodec,
    repository_id: &str,
    files: &[SourceFile],
    params: &ChunkParams,
) -> RagResult<(Vec<Chunk>, usize)> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut files_skipped = 0usize;
    for file in files {
        let file_chunks =
            chunk_file(codec, repository_id, file, params).map_err(RagError::Tokenizer)?;
        if file_chunks.is_empty() {
            debug!(path = %file.path, "file produced no chunks");
            files_skipped += 1;
            continue;
        }
        chunks.extend(file_chunks);
    }
    Ok((chunks, files_skipped))
}

/// Embed one chunk and upsert it. Returns `true` when the zero vector was
/// stored in place of a real embedding.
async fn embed_and_store(ctx: &IngestContext<'_>, chunk: Chunk) -> RagResult<bool> {
    let (vector, degraded) = match ctx.embedder.embed(&chunk.text).await {
        Ok(v) if v.len() == EMBEDDING_DIMS => (v, false),
        Ok(v) => {
            warn!(
                chunk_id = %chunk.id(),
                got = v.len(),
                expected = EMBEDDING_DIMS,
                "embedding has wrong dimensionality, storing zero vector"
            );
            (vec![0.0; EMBEDDING_DIMS], true)
        }
        Err(e) => {
            warn!(chunk_id = %chunk.id(), error = %e, "embedding failed, storing zero vector");
            (vec![0.0; EMBEDDING_DIMS], true)
        }
    };

    let repository_id = chunk.repository_id.clone();
    ctx.store
        .upsert(&EmbeddedChunk { chunk, vector })
        .await
        .map_err(|e| RagError::store(&repository_id, "upsert", e))?;

    Ok(degraded)
}

/// Tracks repositories with an ingestion in flight.
#[derive(Default)]
pub struct IngestLocks {
    active: Mutex<HashSet<String>>,
}

/// Releases the repository's slot when dropped.
pub struct IngestGuard<'a> {
    locks: &'a IngestLocks,
    repository_id: String,
}

impl IngestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `repository_id`, failing fast if another ingestion holds it.
    pub fn acquire(&self, repository_id: &str) -> RagResult<IngestGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(repository_id.to_string()) {
            return Err(RagError::IngestInProgress {
                repository_id: repository_id.to_string(),
            });
        }
        Ok(IngestGuard {
            locks: self,
            repository_id: repository_id.to_string(),
        })
    }
}

impl Drop for IngestGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.locks.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.repository_id);
    }
}
