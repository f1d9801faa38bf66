use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and schema. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an already-open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS code_chunks (
            chunk_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            UNIQUE(repo_id, file_path, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_code_chunks_repo ON code_chunks(repo_id)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Chunk, EmbeddedChunk};
    use crate::store::{SqliteVectorStore, VectorStore};
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        let src = format!(
            "[db]\npath = \"{}\"\n",
            tmp.path().join("data").join("rqa.sqlite").display()
        );
        toml::from_str(&src).unwrap()
    }

    fn row(ordinal: usize, text: &str, v: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                repository_id: "repo".into(),
                file_path: "src/auth.py".into(),
                ordinal,
                text: text.into(),
            },
            vector: v,
        }
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        run_migrations(&config).await.unwrap();
        run_migrations(&config).await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_store_upsert_and_search() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let pool = db::connect(&config).await.unwrap();
        migrate_pool(&pool).await.unwrap();
        let store = SqliteVectorStore::new(pool);

        store.upsert(&row(0, "def login()", vec![1.0, 0.0])).await.unwrap();
        store.upsert(&row(1, "def logout()", vec![0.0, 1.0])).await.unwrap();
        store.upsert(&row(1, "def logout(user)", vec![0.0, 1.0])).await.unwrap();

        assert_eq!(store.count("repo").await.unwrap(), 2);
        assert_eq!(store.count("other").await.unwrap(), 0);

        let rows = store.nearest_neighbors(&[0.0, 1.0], "repo", 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chunk_id, "repo__src/auth.py__1");
        assert_eq!(rows[0].text, "def logout(user)");
        assert!(rows[0].distance < 1e-6);
        assert!(rows[1].distance > rows[0].distance);
    }
}
