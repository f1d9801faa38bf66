//! In-memory [`VectorStore`] implementation for testing.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, keyed by chunk id so
//! upserts replace in place. Search is brute-force cosine distance.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{CandidateRow, EmbeddedChunk};

use super::{rank, VectorStore};

struct StoredRow {
    repository_id: String,
    file_path: String,
    text: String,
    vector: Vec<f32>,
}

/// In-memory store for tests and single-process demos.
pub struct InMemoryVectorStore {
    rows: RwLock<BTreeMap<String, StoredRow>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Total rows across all repositories.
    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored vector for a chunk id, if any.
    pub fn vector(&self, chunk_id: &str) -> Option<Vec<f32>> {
        self.rows
            .read()
            .ok()
            .and_then(|rows| rows.get(chunk_id).map(|r| r.vector.clone()))
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        rows.insert(
            chunk.chunk.id(),
            StoredRow {
                repository_id: chunk.chunk.repository_id.clone(),
                file_path: chunk.chunk.file_path.clone(),
                text: chunk.chunk.text.clone(),
                vector: chunk.vector.clone(),
            },
        );
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        repository_id: &str,
        k: usize,
    ) -> Result<Vec<CandidateRow>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        let candidates = rows
            .iter()
            .filter(|(_, row)| row.repository_id == repository_id)
            .map(|(id, row)| CandidateRow {
                chunk_id: id.clone(),
                file_path: row.file_path.clone(),
                text: row.text.clone(),
                distance: cosine_distance(query, &row.vector),
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn count(&self, repository_id: &str) -> Result<usize> {
        let rows = self
            .rows
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(rows
            .values()
            .filter(|row| row.repository_id == repository_id)
            .count())
    }
}
