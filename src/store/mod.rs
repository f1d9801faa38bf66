//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only contract the pipeline has with
//! persistence: idempotent upserts keyed by chunk id, and nearest-neighbour
//! search scoped to one repository. The store owns indexing and is treated
//! as ground truth.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! | Implementation | Backing | Distance |
//! |----------------|---------|----------|
//! | [`SqliteVectorStore`] | SQLite table, f32 BLOBs | cosine distance |
//! | [`InMemoryVectorStore`] | `RwLock<BTreeMap>` | cosine distance |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CandidateRow, EmbeddedChunk};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the row keyed by `chunk.chunk.id()`.
    async fn upsert(&self, chunk: &EmbeddedChunk) -> Result<()>;

    /// Up to `k` rows of `repository_id`, ascending by distance to `query`.
    async fn nearest_neighbors(
        &self,
        query: &[f32],
        repository_id: &str,
        k: usize,
    ) -> Result<Vec<CandidateRow>>;

    /// Number of stored rows for `repository_id`.
    async fn count(&self, repository_id: &str) -> Result<usize>;
}

/// Sort by distance ascending and keep the first `k`.
///
/// Ties keep their input order, which for both stores is chunk id order.
pub(crate) fn rank(mut rows: Vec<CandidateRow>, k: usize) -> Vec<CandidateRow> {
    rows.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows.truncate(k);
    rows
}
