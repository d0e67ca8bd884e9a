//! Token-aware sliding-window chunker.
//!
//! Documents are tokenized with the `cl100k_base` encoding, split by a window of
//! `chunk_size` tokens stepping `chunk_size - overlap`, and each window is
//! detokenized back to text. Positions and totals are assigned before returning so
//! a chunk always knows where it sits in its document.

use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Chunking configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    /// Overlap must leave room for the window to advance.
    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Configured window size.
        chunk_size: usize,
        /// Configured overlap.
        overlap: usize,
    },
    /// Tokenizer resources were unavailable.
    #[error("failed to initialize tokenizer: {0}")]
    Tokenizer(String),
    /// A token window could not be detokenized back to text.
    #[error("failed to detokenize chunk {index}: {message}")]
    Detokenize {
        /// Chunk position within the document.
        index: usize,
        /// Underlying tokenizer error.
        message: String,
    },
}

/// One bounded slice of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk text content.
    pub text: String,
    /// Zero-based position within the document.
    pub index: usize,
    /// Total chunks produced for the document.
    pub total: usize,
    /// Number of tokens in this chunk.
    pub token_count: usize,
}

/// Token-window splitter backed by a fixed tokenizer.
pub struct Chunker {
    bpe: CoreBPE,
}

impl Chunker {
    /// Build a chunker over the `cl100k_base` encoding.
    pub fn new() -> Result<Self, ChunkError> {
        let bpe = cl100k_base().map_err(|error| ChunkError::Tokenizer(error.to_string()))?;
        Ok(Self { bpe })
    }

    /// Count tokens in `text` under the chunker's encoding.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into chunks of at most `chunk_size` tokens, adjacent chunks
    /// sharing exactly `overlap` tokens except at document boundaries.
    ///
    /// Empty (or whitespace-only) input yields an empty vector; a document shorter
    /// than `chunk_size` yields a single chunk with `total = 1`.
    pub fn chunk(
        &self,
        text: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Vec<Chunk>, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self.bpe.encode_ordinary(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let step = chunk_size - overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + chunk_size).min(tokens.len());
            let window = tokens[start..end].to_vec();
            let token_count = window.len();
            let index = chunks.len();
            let text = self
                .bpe
                .decode(window)
                .map_err(|error| ChunkError::Detokenize {
                    index,
                    message: error.to_string(),
                })?;
            chunks.push(Chunk {
                text,
                index,
                total: 0,
                token_count,
            });

            if end == tokens.len() {
                break;
            }
            start += step;
        }

        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.total = total;
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> Chunker {
        Chunker::new().expect("tokenizer available")
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = chunker();
        assert!(chunker.chunk("", 10, 2).expect("chunks").is_empty());
        assert!(chunker.chunk("   \n\t ", 10, 2).expect("chunks").is_empty());
    }

    #[test]
    fn short_document_yields_one_chunk() {
        let chunker = chunker();
        let chunks = chunker.chunk("A short sentence.", 500, 50).expect("chunks");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total, 1);
        assert!(chunks[0].token_count <= 500);
        assert_eq!(chunks[0].text, "A short sentence.");
    }

    #[test]
    fn overlap_must_leave_room_to_advance() {
        let chunker = chunker();
        assert!(matches!(
            chunker.chunk("text", 10, 10),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            chunker.chunk("text", 10, 11),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            chunker.chunk("text", 0, 0),
            Err(ChunkError::ZeroChunkSize)
        ));
    }

    #[test]
    fn windows_share_exactly_the_overlap() {
        let chunker = chunker();
        // Each " wordN" is deterministic under cl100k; what matters below is the
        // token arithmetic, not any specific tokenization.
        let text = (0..120)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunk_size = 32;
        let overlap = 8;
        let chunks = chunker.chunk(&text, chunk_size, overlap).expect("chunks");
        assert!(chunks.len() > 1);

        let total_tokens = chunker.count_tokens(&text);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total, total);
            assert!(chunk.token_count <= chunk_size);
            if i + 1 < total {
                assert_eq!(chunk.token_count, chunk_size);
            }
        }

        // Sliding-window accounting: the chunks jointly cover every token, counting
        // each interior boundary's overlap once more than the source.
        let summed: usize = chunks.iter().map(|chunk| chunk.token_count).sum();
        assert_eq!(summed, total_tokens + overlap * (total - 1));
    }

    #[test]
    fn chunk_count_matches_the_stride() {
        let chunker = chunker();
        let text = (0..50)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let tokens = chunker.count_tokens(&text);
        let chunk_size = 20;
        let overlap = 5;
        let step = chunk_size - overlap;
        let expected = if tokens <= chunk_size {
            1
        } else {
            1 + (tokens - chunk_size).div_ceil(step)
        };

        let chunks = chunker.chunk(&text, chunk_size, overlap).expect("chunks");
        assert_eq!(chunks.len(), expected);
    }
}
