//! Heuristic chunk importance scoring.
//!
//! Chunks that look structurally important (headings, emphasised text, code
//! fences, list items, early position) are ranked first so that the most
//! distinctive parts of new content seed retrieval.
//!
//! The score of a chunk is the sum of:
//!
//! | Signal   | Bonus                                              |
//! |----------|----------------------------------------------------|
//! | heading  | `heading_levels[depth]`, 0 for unmapped depths     |
//! | position | `max(0, w - (pos / total) * w)`                    |
//! | bold     | `w * count(**…**)`, empty spans included           |
//! | italic   | `w * count(*…*)` after bold spans are removed      |
//! | code     | `w` if the trimmed chunk opens a fence             |
//! | list     | `w` if the trimmed chunk opens with `-`, `*` or a  |
//! |          | single digit, then whitespace                      |

use dupscan_core::DupError;
use dupscan_core::config::ScoreWeights;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#+)\s").expect("valid regex"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("valid regex"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*\d]\s").expect("valid regex"));

const FENCE_MARKERS: [&str; 2] = ["```", "~~~"];

/// A chunk with its heuristic score and original position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// 0-based position of the chunk in its document.
    pub position: usize,
    pub text: String,
    pub score: f32,
}

/// Scores chunks with a fixed set of [`ScoreWeights`].
#[derive(Debug, Clone, Default)]
pub struct ChunkScorer {
    weights: ScoreWeights,
}

impl ChunkScorer {
    #[must_use]
    pub const fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub const fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Score one chunk at position `pos` of `total`.
    ///
    /// # Errors
    ///
    /// Returns [`DupError::InvalidChunkPosition`] unless `pos < total`.
    pub fn score(&self, chunk: &str, pos: usize, total: usize) -> Result<f32, DupError> {
        if pos >= total {
            return Err(DupError::InvalidChunkPosition { pos, total });
        }
        Ok(self.score_at(chunk, pos, total))
    }

    /// Score every chunk and return them ordered by score, highest first.
    ///
    /// Equal scores keep their original order.
    #[must_use]
    pub fn rank(&self, chunks: &[String]) -> Vec<ScoredChunk> {
        let total = chunks.len();
        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .enumerate()
            .map(|(position, text)| ScoredChunk {
                position,
                text: text.clone(),
                score: self.score_at(text, position, total),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    fn score_at(&self, chunk: &str, pos: usize, total: usize) -> f32 {
        let w = &self.weights;
        let trimmed = chunk.trim();

        let mut score = self.heading_bonus(chunk);
        score += self.position_bonus(pos, total);
        score += w.bold * count_as_f32(BOLD.find_iter(chunk).count());
        score += w.italic * count_as_f32(italic_count(chunk));

        if FENCE_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
            score += w.code;
        }
        if LIST_ITEM.is_match(trimmed) {
            score += w.list;
        }

        score
    }

    fn heading_bonus(&self, chunk: &str) -> f32 {
        HEADING
            .captures(chunk)
            .and_then(|caps| caps.get(1))
            .map_or(0.0, |m| self.weights.heading_bonus(m.as_str().len()))
    }

    /// Linear decay from the full position weight at `pos = 0` to zero at
    /// `pos = total`. Never negative.
    #[must_use]
    pub fn position_bonus(&self, pos: usize, total: usize) -> f32 {
        let weight = self.weights.position;
        let fraction = count_as_f32(pos) / count_as_f32(total.max(1));
        (weight - fraction * weight).max(0.0)
    }
}

/// Italic spans, counted on the text with bold spans reduced to their
/// content so `**x**` is never also read as `*x*`.
fn italic_count(chunk: &str) -> usize {
    let without_bold = BOLD.replace_all(chunk, "$1");
    ITALIC.find_iter(&without_bold).count()
}

#[allow(clippy::cast_precision_loss)]
const fn count_as_f32(n: usize) -> f32 {
    n as f32
}
