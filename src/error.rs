//! Error taxonomy for the ingestion and query pipeline.
//!
//! Adapters (HTTP clients, SQLite, git) report failures as
//! [`anyhow::Error`]; the pipeline wraps them in [`RagError`] so callers can
//! tell input problems, empty repositories, and upstream outages apart
//! without string matching.

use thiserror::Error;

/// Convenience alias for pipeline results.
pub type RagResult<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or malformed repository id, question, variant, or URL.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The repository produced no files to index.
    #[error("no ingestible content for repository {repository_id}")]
    NoIngestibleContent { repository_id: String },

    /// Another ingestion of the same repository is still running.
    #[error("ingestion already in progress for repository {repository_id}")]
    IngestInProgress { repository_id: String },

    /// The embedding collaborator failed on the query path.
    #[error("embedding failed during {operation}: {source}")]
    Embedding {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The vector store rejected or could not serve a request.
    #[error("vector store {operation} failed for repository {repository_id}: {source}")]
    Store {
        repository_id: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The generative model call failed; carries the upstream detail verbatim.
    #[error("generation failed: {message}")]
    Generation { message: String },

    /// Cloning or reading the repository failed.
    #[error("repository source error: {0}")]
    Source(#[source] anyhow::Error),

    /// Tokenizer could not be loaded or could not process the text.
    #[error("tokenizer error: {0}")]
    Tokenizer(#[source] anyhow::Error),
}

impl RagError {
    pub(crate) fn store(repository_id: &str, operation: &'static str, source: anyhow::Error) -> Self {
        RagError::Store {
            repository_id: repository_id.to_string(),
            operation,
            source,
        }
    }
}
