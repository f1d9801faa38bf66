//! Overlapping token-window chunker.
//!
//! Splits a file's text into windows of at most `max_tokens` tokens, where
//! consecutive windows share `overlap_tokens` tokens. Windows are cut on
//! token boundaries of the shared [`TokenCodec`] and decoded back to text.
//!
//! # Algorithm
//!
//! With `W = max_tokens`, `O = overlap_tokens`, stride `S = W - O` and `T`
//! total tokens:
//!
//! 1. `T == 0` → no windows.
//! 2. Emit `[start, min(start + W, T))` for `start = 0, S, 2S, …`.
//! 3. Stop right after the first window whose end reaches `T`.
//! 4. If an advanced `start` lands inside the last `O` tokens of a text
//!    longer than `S`, pull it back to `T - S` so the tail window is never a
//!    sliver that duplicates the previous window.
//! 5. Decode each window; whitespace-only windows are dropped.
//!
//! # Example
//!
//! ```rust
//! use repo_qa::chunk::{window_ranges, ChunkParams};
//!
//! let params = ChunkParams::default(); // W = 1024, O = 256
//! assert_eq!(window_ranges(1024, &params), vec![0..1024]);
//! assert!(window_ranges(0, &params).is_empty());
//! ```

use anyhow::{bail, Result};
use std::ops::Range;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, SourceFile};
use crate::tokenizer::TokenCodec;

/// Window size and overlap, with `max_tokens > overlap_tokens` guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl ChunkParams {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            bail!("max_tokens must be > 0");
        }
        if overlap_tokens >= max_tokens {
            bail!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                overlap_tokens,
                max_tokens
            );
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_tokens, config.overlap_tokens)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Distance between consecutive window starts; always > 0.
    pub fn stride(&self) -> usize {
        self.max_tokens - self.overlap_tokens
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            overlap_tokens: 256,
        }
    }
}

/// Compute the token windows for a text of `total` tokens.
pub fn window_ranges(total: usize, params: &ChunkParams) -> Vec<Range<usize>> {
    let stride = params.stride();
    let mut ranges = Vec::new();
    let mut start = 0usize;

    while start < total {
        let end = (start + params.max_tokens).min(total);
        ranges.push(start..end);
        if end == total {
            break;
        }
        start += stride;
        if start >= total.saturating_sub(params.overlap_tokens) && start < total && total > stride
        {
            start = total - stride;
        }
    }

    ranges
}

/// Split `text` into decoded token windows.
///
/// Each returned string re-encodes to at most `max_tokens` tokens. A window
/// whose decoded text re-tokenizes longer (possible when a cut splits a
/// multi-byte sequence) is shortened until it fits. The first window loses
/// tokens from its end; every later window loses them from its start, where
/// the previous window's overlap already covers them. The end of the text is
/// therefore always indexed.
pub fn chunk_text(codec: &dyn TokenCodec, text: &str, params: &ChunkParams) -> Result<Vec<String>> {
    let tokens = codec.encode(text)?;
    let mut chunks = Vec::new();

    for range in window_ranges(tokens.len(), params) {
        let trim_front = range.start > 0;
        let (mut start, mut end) = (range.start, range.end);
        let mut decoded = codec.decode(&tokens[start..end])?;
        while end > start + 1 && codec.encode(&decoded)?.len() > params.max_tokens {
            if trim_front {
                start += 1;
            } else {
                end -= 1;
            }
            decoded = codec.decode(&tokens[start..end])?;
        }
        if decoded.trim().is_empty() {
            continue;
        }
        chunks.push(decoded);
    }

    Ok(chunks)
}

/// Chunk one file, assigning contiguous ordinals from 0.
pub fn chunk_file(
    codec: &dyn TokenCodec,
    repository_id: &str,
    file: &SourceFile,
    params: &ChunkParams,
) -> Result<Vec<Chunk>> {
    Ok(chunk_text(codec, &file.text, params)?
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| Chunk {
            repository_id: repository_id.to_string(),
            file_path: file.path.clone(),
            ordinal,
            text,
        })
        .collect())
}
