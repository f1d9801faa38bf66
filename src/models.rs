//! Core data models used throughout repo-qa.
//!
//! These types represent the repository files, chunks, retrieval candidates,
//! and query results that flow through the ingestion and query pipeline.

use serde::{Deserialize, Serialize};

/// Fixed embedding dimensionality shared by every stored vector.
pub const EMBEDDING_DIMS: usize = 768;

/// A plain-text file handed over by the file source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub text: String,
}

/// A repository ready for ingestion.
#[derive(Debug, Clone)]
pub struct RepositorySource {
    /// Content-derived identifier (SHA-256 hex of the canonical URL).
    pub repository_id: String,
    pub files: Vec<SourceFile>,
}

/// A contiguous window of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub repository_id: String,
    pub file_path: String,
    /// Zero-based position within the file's chunk sequence.
    pub ordinal: usize,
    pub text: String,
}

impl Chunk {
    /// Stable identifier: `repositoryId__filePath__ordinal`.
    pub fn id(&self) -> String {
        chunk_id(&self.repository_id, &self.file_path, self.ordinal)
    }
}

/// Build the stable chunk identifier used as the store's primary key.
pub fn chunk_id(repository_id: &str, file_path: &str, ordinal: usize) -> String {
    format!("{}__{}__{}", repository_id, file_path, ordinal)
}

/// A chunk together with its embedding vector.
///
/// The vector always has [`EMBEDDING_DIMS`] entries; chunks whose embedding
/// failed carry the all-zero vector.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A single nearest-neighbour result for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub chunk_id: String,
    pub file_path: String,
    pub text: String,
    /// Store-native distance; lower is more similar.
    pub distance: f64,
}

/// Retrieval quality scores for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub context_relevance: f64,
    pub groundedness: f64,
    pub num_chunks_retrieved: usize,
}

impl Metrics {
    pub fn empty() -> Self {
        Self {
            context_relevance: 0.0,
            groundedness: 0.0,
            num_chunks_retrieved: 0,
        }
    }
}

/// A cited source in a query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub file_path: String,
    pub distance: f64,
}

/// Final answer returned for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    pub answer: String,
    pub metrics: Metrics,
    pub sources: Vec<SourceRef>,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Always `"success"`; failures are reported as errors instead.
    pub status: &'static str,
    pub repository_id: String,
    pub total_chunks: usize,
    pub files_seen: usize,
    /// Files that produced no chunks (empty or whitespace-only).
    pub files_skipped: usize,
    /// Chunks stored with the all-zero placeholder vector.
    pub zero_vector_chunks: usize,
}
