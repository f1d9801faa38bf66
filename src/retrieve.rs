//! Candidate retrieval for one question.
//!
//! Retrieval is two-stage:
//!
//! 1. Over-fetch a pool of `pool_size` nearest neighbours from the vector
//!    store, scoped to one repository and ordered by ascending distance.
//! 2. Narrow the pool to `top_k` rows with the selected [`Variant`]:
//!    - **`base`**: the first `top_k` rows of the pool.
//!    - **`filtered`**: keep rows whose text contains at least one question
//!      keyword as a whole whitespace-delimited token (case-insensitive).
//!      Keywords are question words longer than `min_keyword_len` chars.
//!      When nothing matches, fall back to the unfiltered pool.
//!
//! An empty pool is a normal outcome and yields no candidates.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::{RagError, RagResult};
use crate::models::CandidateRow;
use crate::store::VectorStore;

/// Retrieval policy selected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Base,
    Filtered,
}

impl FromStr for Variant {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Variant::Base),
            "filtered" => Ok(Variant::Filtered),
            other => Err(RagError::InvalidInput(format!(
                "unknown variant '{}': expected 'base' or 'filtered'",
                other
            ))),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Base => write!(f, "base"),
            Variant::Filtered => write!(f, "filtered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub pool_size: usize,
    pub top_k: usize,
    pub min_keyword_len: usize,
}

impl RetrievalParams {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            pool_size: config.pool_size,
            top_k: config.top_k,
            min_keyword_len: config.min_keyword_len,
        }
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

/// Lower-cased question words strictly longer than `min_len` characters.
pub fn keywords(question: &str, min_len: usize) -> HashSet<String> {
    question
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > min_len)
        .collect()
}

/// Apply `variant` to a distance-ordered candidate pool.
pub fn narrow(
    pool: Vec<CandidateRow>,
    question: &str,
    variant: Variant,
    params: &RetrievalParams,
) -> Vec<CandidateRow> {
    let mut selected = match variant {
        Variant::Base => pool,
        Variant::Filtered => {
            let kw = keywords(question, params.min_keyword_len);
            let matching: Vec<CandidateRow> = pool
                .iter()
                .filter(|row| {
                    row.text
                        .split_whitespace()
                        .any(|w| kw.contains(&w.to_lowercase()))
                })
                .cloned()
                .collect();
            if matching.is_empty() {
                debug!("no keyword matches, falling back to unfiltered pool");
                pool
            } else {
                matching
            }
        }
    };

    selected.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    selected.truncate(params.top_k);
    selected
}

/// Fetch the candidate pool for `repository_id` and narrow it.
pub async fn retrieve(
    store: &dyn VectorStore,
    question: &str,
    question_vec: &[f32],
    repository_id: &str,
    variant: Variant,
    params: &RetrievalParams,
) -> RagResult<Vec<CandidateRow>> {
    let pool = store
        .nearest_neighbors(question_vec, repository_id, params.pool_size)
        .await
        .map_err(|e| RagError::store(repository_id, "nearest_neighbors", e))?;

    let pool_len = pool.len();
    let selected = narrow(pool, question, variant, params);
    debug!(%repository_id, %variant, pool = pool_len, selected = selected.len(), "retrieved candidates");
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, EmbeddedChunk};
    use crate::store::InMemoryVectorStore;

    fn row(path: &str, text: &str, distance: f64) -> CandidateRow {
        CandidateRow {
            chunk_id: format!("repo__{}__0", path),
            file_path: path.into(),
            text: text.into(),
            distance,
        }
    }

    fn pool_of_ten() -> Vec<CandidateRow> {
        let mut pool: Vec<CandidateRow> = (0..9)
            .map(|i| row(&format!("f{}.py", i), "def render(): pass", 0.1 * i as f64))
            .collect();
        pool.push(row("auth.py", "# authentication helpers\ndef login(): pass", 0.95));
        pool
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("base".parse::<Variant>().unwrap(), Variant::Base);
        assert_eq!("filtered".parse::<Variant>().unwrap(), Variant::Filtered);
        assert!(matches!(
            "fancy".parse::<Variant>(),
            Err(RagError::InvalidInput(_))
        ));
        assert_eq!(Variant::Filtered.to_string(), "filtered");
    }

    #[test]
    fn test_keywords_length_threshold() {
        let kw = keywords("How does Authentication work?", 3);
        assert!(kw.contains("does"));
        assert!(kw.contains("authentication"));
        assert!(kw.contains("work?"));
        assert!(!kw.contains("how"));
    }

    #[test]
    fn test_filtered_keeps_keyword_match_first() {
        let params = RetrievalParams::default();
        let out = narrow(
            pool_of_ten(),
            "How does authentication work?",
            Variant::Filtered,
            &params,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file_path, "auth.py");
    }

    #[test]
    fn test_filtered_fallback_equals_base() {
        let params = RetrievalParams {
            top_k: 5,
            ..RetrievalParams::default()
        };
        let question = "zzzz qqqq";
        let base = narrow(pool_of_ten(), question, Variant::Base, &params);
        let filtered = narrow(pool_of_ten(), question, Variant::Filtered, &params);
        assert_eq!(base, filtered);
        assert_eq!(base.len(), 5);
    }

    #[test]
    fn test_filtered_fallback_over_full_pool() {
        let params = RetrievalParams::default();
        assert_eq!((params.pool_size, params.top_k), (50, 10));
        // Reverse distance order so narrowing has to sort.
        let pool: Vec<CandidateRow> = (0..50)
            .rev()
            .map(|i| row(&format!("mod_{}.rs", i), "fn handler() {}", 0.01 * i as f64))
            .collect();
        let question = "Where are websockets negotiated?";

        let base = narrow(pool.clone(), question, Variant::Base, &params);
        let filtered = narrow(pool, question, Variant::Filtered, &params);
        assert_eq!(filtered, base);
        assert_eq!(filtered.len(), 10);
        let paths: Vec<String> = filtered.iter().map(|r| r.file_path.clone()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("mod_{}.rs", i)).collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_base_truncates_in_distance_order() {
        let params = RetrievalParams {
            top_k: 3,
            ..RetrievalParams::default()
        };
        let out = narrow(pool_of_ten(), "anything", Variant::Base, &params);
        let paths: Vec<&str> = out.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(paths, vec!["f0.py", "f1.py", "f2.py"]);
    }

    #[tokio::test]
    async fn test_empty_pool_is_not_an_error() {
        let store = InMemoryVectorStore::new();
        let out = retrieve(
            &store,
            "How does authentication work?",
            &[1.0, 0.0],
            "missing",
            Variant::Filtered,
            &RetrievalParams::default(),
        )
        .await
        .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_scoped_to_repository() {
        let store = InMemoryVectorStore::new();
        for (repo, path) in [("a", "x.py"), ("b", "y.py")] {
            store
                .upsert(&EmbeddedChunk {
                    chunk: Chunk {
                        repository_id: repo.into(),
                        file_path: path.into(),
                        ordinal: 0,
                        text: "code".into(),
                    },
                    vector: vec![1.0, 0.0],
                })
                .await
                .unwrap();
        }
        let out = retrieve(
            &store,
            "code",
            &[1.0, 0.0],
            "a",
            Variant::Base,
            &RetrievalParams::default(),
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file_path, "x.py");
    }
}
