//! Embedding backends.

use anyhow::{Context, Result, bail};
use dupscan_core::DupError;
use dupscan_core::config::{EmbeddingConfig, EmbeddingProvider};
use dupscan_core::model::EmbeddingVector;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps text to a fixed-dimension vector.
pub trait Embedder {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot produce a vector.
    fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Embed several texts, preserving order.
    ///
    /// # Errors
    ///
    /// Returns an error if any text cannot be embedded.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Offline embedder using signed feature hashing of word unigrams and
/// bigrams.
///
/// Deterministic and dependency-free at runtime. Texts sharing vocabulary
/// land close together; synonyms do not. Text without any word yields the
/// zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// # Errors
    ///
    /// Returns [`DupError::NonPositiveParameter`] for a zero dimension.
    pub const fn new(dimension: usize) -> Result<Self, DupError> {
        if dimension == 0 {
            return Err(DupError::NonPositiveParameter { name: "dimension" });
        }
        Ok(Self { dimension })
    }

    fn bucket_and_sign(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let hash = digest[..8]
            .iter()
            .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte));
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (reduce(hash, self.dimension), sign)
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut vector = vec![0.0_f32; self.dimension];
        for word in &words {
            let (bucket, sign) = self.bucket_and_sign(word);
            vector[bucket] += sign;
        }
        for pair in words.windows(2) {
            let (bucket, sign) = self.bucket_and_sign(&format!("{} {}", pair[0], pair[1]));
            vector[bucket] += sign * 0.5;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn reduce(hash: u64, dimension: usize) -> usize {
    (hash % dimension as u64) as usize
}

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbedder {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
}

impl HttpEmbedder {
    #[must_use]
    pub fn new(endpoint: &str, model: &str, api_key: String, dimension: usize) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
            dimension,
        }
    }
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors.pop().context("embedding response was empty")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(endpoint = %self.endpoint, count = texts.len(), "requesting embeddings");
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("User-Agent", "dupscan")
            .send_json(serde_json::json!({
                "model": self.model,
                "input": texts,
                "dimensions": self.dimension,
            }))
            .map_err(|err| anyhow::anyhow!("embedding request to {} failed: {err}", self.endpoint))?;

        let body: EmbeddingResponse = response
            .into_json()
            .context("failed to decode embedding response JSON")?;

        order_response(body, texts.len(), self.dimension)
    }
}

fn order_response(
    body: EmbeddingResponse,
    expected: usize,
    dimension: usize,
) -> Result<Vec<EmbeddingVector>> {
    if body.data.len() != expected {
        bail!(
            "embedding batch length mismatch: expected {expected}, got {}",
            body.data.len()
        );
    }

    let mut data = body.data;
    data.sort_by_key(|d| d.index);

    let mut out = Vec::with_capacity(data.len());
    for datum in data {
        if datum.embedding.len() != dimension {
            return Err(DupError::DimensionMismatch {
                expected: dimension,
                actual: datum.embedding.len(),
            }
            .into());
        }
        out.push(datum.embedding);
    }
    Ok(out)
}

/// Build the embedder selected by `[embedding]`.
///
/// # Errors
///
/// Returns an error for a zero dimension or, for `openai`, when the API key
/// environment variable is unset.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Hash => Ok(Box::new(HashingEmbedder::new(config.dimension)?)),
        EmbeddingProvider::Openai => {
            let api_key = std::env::var(&config.api_key_env).with_context(|| {
                format!(
                    "environment variable {} is not set (needed by provider = \"openai\")",
                    config.api_key_env
                )
            })?;
            Ok(Box::new(HttpEmbedder::new(
                &config.endpoint,
                &config.model,
                api_key,
                config.dimension,
            )))
        }
    }
}
