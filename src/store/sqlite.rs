//! SQLite-backed [`VectorStore`].
//!
//! Rows live in the `code_chunks` table (see [`crate::migrate`]) with the
//! embedding stored as a little-endian f32 BLOB. Upserts are a single
//! `INSERT … ON CONFLICT(chunk_id) DO UPDATE` statement, so each one is
//! atomic and re-ingestion overwrites instead of duplicating. Search loads
//! the repository's vectors and ranks them by cosine distance in Rust.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::models::{CandidateRow, EmbeddedChunk};

use super::{rank, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO code_chunks (chunk_id, repo_id, file_path, chunk_index, chunk_text, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                repo_id = excluded.repo_id,
                file_path = excluded.file_path,
                chunk_index = excluded.chunk_index,
                chunk_text = excluded.chunk_text,
                embedding = excluded.embedding
            "#,
        )
        .bind(chunk.chunk.id())
        .bind(&chunk.chunk.repository_id)
        .bind(&chunk.chunk.file_path)
        .bind(chunk.chunk.ordinal as i64)
        .bind(&chunk.chunk.text)
        .bind(vec_to_blob(&chunk.vector))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        repository_id: &str,
        k: usize,
    ) -> Result<Vec<CandidateRow>> {
        let rows = sqlx::query(
            r#"
            SELECT chunk_id, file_path, chunk_text, embedding
            FROM code_chunks
            WHERE repo_id = ?
            ORDER BY chunk_id
            "#,
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                CandidateRow {
                    chunk_id: row.get("chunk_id"),
                    file_path: row.get("file_path"),
                    text: row.get("chunk_text"),
                    distance: cosine_distance(query, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(candidates, k))
    }

    async fn count(&self, repository_id: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_chunks WHERE repo_id = ?")
            .bind(repository_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}
