//! Content chunking.
//!
//! Splits submitted content into the ordered chunk list that the scorer,
//! the retrieval fan-out and the embedder all operate on. Chunking is
//! deterministic: identical input always yields identical chunks.
//!
//! - [`ContentType::Text`]: blank-line separated paragraphs.
//! - [`ContentType::Markdown`]: top-level CommonMark blocks, kept as verbatim
//!   source so heading, emphasis, list and fence markers survive.
//! - [`ContentType::Code`]: whitespace-token windows with a fixed overlap.

use crate::config::ChunkingConfig;
use crate::model::ContentType;
use pulldown_cmark::{Event, Options, Parser};

/// Splits content into an ordered list of chunks.
pub trait Chunker {
    /// Chunk `content` according to `content_type`. Blank content yields an
    /// empty list.
    fn split(&self, content: &str, content_type: ContentType) -> Vec<String>;
}

/// The built-in chunker used by ingestion and search.
#[derive(Debug, Clone, Default)]
pub struct DefaultChunker {
    config: ChunkingConfig,
}

impl DefaultChunker {
    #[must_use]
    pub const fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }
}

impl Chunker for DefaultChunker {
    fn split(&self, content: &str, content_type: ContentType) -> Vec<String> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        match content_type {
            ContentType::Text => split_paragraphs(content),
            ContentType::Markdown => split_markdown_blocks(content),
            ContentType::Code => split_token_windows(content, &self.config),
        }
    }
}

/// Split on blank lines, trimming each paragraph and dropping empties.
#[must_use]
pub fn split_paragraphs(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n");
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n").trim().to_string());
    }

    paragraphs.retain(|p| !p.is_empty());
    paragraphs
}

/// One chunk per top-level markdown block, as the original source slice.
#[must_use]
pub fn split_markdown_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut depth = 0_usize;

    let parser = Parser::new_ext(content, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(_) => {
                if depth == 0 {
                    let block = content[range].trim();
                    if !block.is_empty() {
                        blocks.push(block.to_string());
                    }
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    blocks
}

/// Overlapping windows of whitespace-separated tokens.
///
/// Each window holds at most `max_tokens` tokens and shares
/// `ceil(max_tokens * overlap_ratio)` tokens with its predecessor. Windows
/// are slices of the original text so line structure is preserved.
#[must_use]
pub fn split_token_windows(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let spans = token_spans(content);
    if spans.is_empty() {
        return Vec::new();
    }

    let max_tokens = config.max_tokens.max(1);
    let overlap = overlap_tokens(max_tokens, config.overlap_ratio);
    let step = max_tokens - overlap;

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + max_tokens).min(spans.len());
        let (from, _) = spans[start];
        let (_, to) = spans[end - 1];
        windows.push(content[from..to].to_string());

        if end == spans.len() {
            break;
        }
        start += step;
    }

    windows
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn overlap_tokens(max_tokens: usize, ratio: f32) -> usize {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let raw = (max_tokens as f32 * ratio).ceil() as usize;
    // At least one new token per window.
    raw.min(max_tokens - 1)
}

fn token_spans(content: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in content.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, idx));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        spans.push((s, content.len()));
    }

    spans
}
