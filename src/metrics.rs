//! Answer quality metrics.
//!
//! Both scores are heuristics computed after the fact, in `[0.0, 1.0]`,
//! and rounded to four decimal places:
//!
//! - **context relevance**: mean of `1 / (1 + max(0, distance))` over the
//!   retrieved candidates.
//! - **groundedness**: share of the answer's distinct token ids that also
//!   occur somewhere in the candidates' text.

use anyhow::Result;
use std::collections::HashSet;

use crate::models::{CandidateRow, Metrics};
use crate::tokenizer::TokenCodec;

/// Map a non-negative distance to a similarity in `(0, 1]`.
pub fn similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Mean similarity of the candidates; 0 when there are none.
pub fn context_relevance(candidates: &[CandidateRow]) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    candidates.iter().map(|c| similarity(c.distance)).sum::<f64>() / candidates.len() as f64
}

/// Token-set overlap of the answer with the candidate texts.
pub fn groundedness(
    codec: &dyn TokenCodec,
    answer: &str,
    candidates: &[CandidateRow],
) -> Result<f64> {
    let answer_tokens: HashSet<u32> = codec.encode(answer)?.into_iter().collect();
    if answer_tokens.is_empty() {
        return Ok(0.0);
    }

    let mut snippet_tokens = HashSet::new();
    for c in candidates {
        snippet_tokens.extend(codec.encode(&c.text)?);
    }

    let overlap = answer_tokens
        .iter()
        .filter(|t| snippet_tokens.contains(t))
        .count();
    Ok(overlap as f64 / answer_tokens.len() as f64)
}

/// Round half away from zero to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Compute all metrics for one answer.
pub fn evaluate(
    codec: &dyn TokenCodec,
    answer: &str,
    candidates: &[CandidateRow],
) -> Result<Metrics> {
    Ok(Metrics {
        context_relevance: round4(context_relevance(candidates)),
        groundedness: round4(groundedness(codec, answer, candidates)?),
        num_chunks_retrieved: candidates.len(),
    })
}
