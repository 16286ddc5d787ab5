//! Pluggable confidence scoring for generated answers.

use super::state::RetrievedChunk;

/// Scores answer confidence from the characteristics of the retrieved set.
///
/// Confidence is a property of retrieval quality, not of the model's own
/// self-report, so implementations must be deterministic and reproducible
/// without re-invoking the model.
pub trait ConfidenceScorer: Send + Sync {
    /// Returns a confidence in `[0, 1]` for an answer grounded in `chunks`.
    fn score(&self, chunks: &[RetrievedChunk]) -> f64;
}

/// Default heuristic: each chunk long enough to be informative contributes a
/// fixed amount, capped below 1.0.
#[derive(Debug, Clone)]
pub struct ChunkLengthScorer {
    /// Minimum chunk length that counts as informative.
    pub min_informative_chars: usize,
    /// Contribution per informative chunk.
    pub per_chunk: f64,
    /// Upper bound on the score.
    pub cap: f64,
}

impl Default for ChunkLengthScorer {
    fn default() -> Self {
        Self {
            min_informative_chars: 100,
            per_chunk: 0.2,
            cap: 0.9,
        }
    }
}

impl ConfidenceScorer for ChunkLengthScorer {
    fn score(&self, chunks: &[RetrievedChunk]) -> f64 {
        let informative = chunks
            .iter()
            .filter(|chunk| chunk.text.chars().count() > self.min_informative_chars)
            .count();
        #[allow(clippy::cast_precision_loss)]
        let raw = informative as f64 * self.per_chunk;
        raw.min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(len: usize) -> RetrievedChunk {
        RetrievedChunk {
            text: "x".repeat(len),
            source_document_id: "doc".to_string(),
            source_title: "Doc".to_string(),
            similarity_score: 0.8,
        }
    }

    #[test]
    fn short_chunks_do_not_contribute() {
        let scorer = ChunkLengthScorer::default();
        assert_eq!(scorer.score(&[chunk(50), chunk(99)]), 0.0);
    }

    #[test]
    fn informative_chunks_add_up() {
        let scorer = ChunkLengthScorer::default();
        let score = scorer.score(&[chunk(200), chunk(300), chunk(50)]);
        assert!((score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn score_is_capped() {
        let scorer = ChunkLengthScorer::default();
        let chunks: Vec<_> = (0..10).map(|_| chunk(500)).collect();
        assert!((scorer.score(&chunks) - 0.9).abs() < 1e-9);
    }
}
