use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory holding the knowledge base and its configuration.
pub const DUPSCAN_DIR: &str = ".dupscan";
/// Config file name inside [`DUPSCAN_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
/// SQLite database file name inside [`DUPSCAN_DIR`].
pub const DB_FILE: &str = "kb.sqlite3";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

/// Retrieval fan-out, deadline and classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of final candidates returned.
    #[serde(default = "default_top_docs")]
    pub top_docs: usize,
    /// Number of highest-scoring chunks used as retrieval queries.
    #[serde(default = "default_top_nchunk")]
    pub top_nchunk: usize,
    /// Neighbors fetched per query chunk.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Whole-request deadline in milliseconds; `0` disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_likely_duplicate_threshold")]
    pub likely_duplicate_threshold: f32,
    #[serde(default = "default_possibly_related_threshold")]
    pub possibly_related_threshold: f32,
    #[serde(default = "default_maybe_related_threshold")]
    pub maybe_related_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_docs: default_top_docs(),
            top_nchunk: default_top_nchunk(),
            top_k: default_top_k(),
            timeout_ms: default_timeout_ms(),
            likely_duplicate_threshold: default_likely_duplicate_threshold(),
            possibly_related_threshold: default_possibly_related_threshold(),
            maybe_related_threshold: default_maybe_related_threshold(),
        }
    }
}

/// Heuristic weights used to rank chunks before retrieval.
///
/// `heading_levels` maps a heading depth to its bonus and is written as a
/// `[weights.heading_levels]` table keyed `1` to `6`. Depths missing from
/// the table score nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Bonus for the first chunk, decaying linearly to 0 at the end.
    #[serde(default = "default_position_weight")]
    pub position: f32,
    #[serde(default = "default_bold_weight")]
    pub bold: f32,
    #[serde(default = "default_italic_weight")]
    pub italic: f32,
    #[serde(default = "default_code_weight")]
    pub code: f32,
    #[serde(default = "default_list_weight")]
    pub list: f32,
    #[serde(default = "default_heading_levels", with = "depth_keys")]
    pub heading_levels: BTreeMap<usize, f32>,
}

impl ScoreWeights {
    /// Bonus for a heading of the given depth (1-based).
    #[must_use]
    pub fn heading_bonus(&self, depth: usize) -> f32 {
        self.heading_levels.get(&depth).copied().unwrap_or(0.0)
    }
}

/// TOML table keys are strings; heading depths are parsed from them.
mod depth_keys {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        levels: &BTreeMap<usize, f32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(levels.iter().map(|(depth, bonus)| (depth.to_string(), bonus)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<usize, f32>, D::Error> {
        BTreeMap::<String, f32>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, bonus)| match key.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => Ok((depth, bonus)),
                _ => Err(D::Error::custom(format!(
                    "heading depth `{key}` is not a positive integer"
                ))),
            })
            .collect()
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            position: default_position_weight(),
            bold: default_bold_weight(),
            italic: default_italic_weight(),
            code: default_code_weight(),
            list: default_list_weight(),
            heading_levels: default_heading_levels(),
        }
    }
}

/// Which embedding backend to use and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            endpoint: default_embedding_endpoint(),
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Offline feature-hashing embedder.
    #[default]
    Hash,
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Openai,
}

/// Token-window parameters for code chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Fraction of `max_tokens` shared between neighboring windows.
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_ratio: default_overlap_ratio(),
        }
    }
}

/// `<root>/.dupscan`
#[must_use]
pub fn dupscan_dir(project_root: &Path) -> PathBuf {
    project_root.join(DUPSCAN_DIR)
}

/// `<root>/.dupscan/kb.sqlite3`
#[must_use]
pub fn db_path(project_root: &Path) -> PathBuf {
    dupscan_dir(project_root).join(DB_FILE)
}

/// Load `.dupscan/config.toml`, falling back to defaults when it is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = dupscan_dir(project_root).join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write a default `.dupscan/config.toml` unless one already exists.
///
/// Returns `true` when a file was written.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_default_config(project_root: &Path) -> Result<bool> {
    let dir = dupscan_dir(project_root);
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let rendered = toml::to_string_pretty(&ProjectConfig::default())
        .context("Failed to render default config")?;
    std::fs::write(&path, rendered)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

const fn default_top_docs() -> usize {
    5
}

const fn default_top_nchunk() -> usize {
    10
}

const fn default_top_k() -> usize {
    3
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_likely_duplicate_threshold() -> f32 {
    0.90
}

const fn default_possibly_related_threshold() -> f32 {
    0.75
}

const fn default_maybe_related_threshold() -> f32 {
    0.50
}

fn default_heading_levels() -> BTreeMap<usize, f32> {
    BTreeMap::from([(1, 6.0), (2, 5.0), (3, 4.0), (4, 3.0), (5, 2.0), (6, 1.0)])
}

const fn default_position_weight() -> f32 {
    3.0
}

const fn default_bold_weight() -> f32 {
    3.0
}

const fn default_italic_weight() -> f32 {
    2.0
}

const fn default_code_weight() -> f32 {
    2.0
}

const fn default_list_weight() -> f32 {
    2.0
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimension() -> usize {
    256
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_max_tokens() -> usize {
    200
}

const fn default_overlap_ratio() -> f32 {
    0.10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.search.top_docs, 5);
        assert_eq!(cfg.search.top_nchunk, 10);
        assert_eq!(cfg.search.top_k, 3);
        assert_eq!(cfg.weights.heading_levels, default_heading_levels());
        assert_eq!(cfg.weights.heading_levels.len(), 6);
        assert_eq!(cfg.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(cfg.chunking.max_tokens, 200);
    }

    #[test]
    fn partial_config_fills_missing_fields() {
        let cfg: ProjectConfig = toml::from_str(
            r#"
[search]
top_docs = 8

[weights]
bold = 1.5

[weights.heading_levels]
1 = 10.0
2 = 1.0

[embedding]
provider = "openai"
dimension = 1536
"#,
        )
        .expect("parse");

        assert_eq!(cfg.search.top_docs, 8);
        assert_eq!(cfg.search.top_k, 3);
        assert!((cfg.weights.bold - 1.5).abs() < f32::EPSILON);
        assert!((cfg.weights.italic - 2.0).abs() < f32::EPSILON);
        assert!((cfg.weights.heading_bonus(1) - 10.0).abs() < f32::EPSILON);
        assert!(cfg.weights.heading_bonus(3).abs() < f32::EPSILON);
        assert_eq!(cfg.embedding.provider, EmbeddingProvider::Openai);
        assert_eq!(cfg.embedding.dimension, 1536);
        assert_eq!(cfg.embedding.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn heading_bonus_ignores_depth_zero_and_unmapped_depths() {
        let weights = ScoreWeights::default();
        assert!(weights.heading_bonus(0).abs() < f32::EPSILON);
        assert!((weights.heading_bonus(1) - 6.0).abs() < f32::EPSILON);
        assert!((weights.heading_bonus(6) - 1.0).abs() < f32::EPSILON);
        assert!(weights.heading_bonus(7).abs() < f32::EPSILON);
    }

    #[test]
    fn sparse_heading_levels_score_only_listed_depths() {
        let cfg: ProjectConfig = toml::from_str(
            r#"
[weights.heading_levels]
3 = 4.5
"#,
        )
        .expect("parse");

        assert_eq!(cfg.weights.heading_levels, BTreeMap::from([(3, 4.5)]));
        assert!((cfg.weights.heading_bonus(3) - 4.5).abs() < f32::EPSILON);
        for depth in [1, 2, 4, 5, 6] {
            assert!(cfg.weights.heading_bonus(depth).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn non_numeric_heading_depth_is_rejected() {
        let err = toml::from_str::<ProjectConfig>(
            r#"
[weights.heading_levels]
h1 = 6.0
"#,
        )
        .expect_err("depth keys must be integers");
        assert!(err.to_string().contains("heading depth"));
    }

    #[test]
    fn invalid_config_reports_path() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let dir = dupscan_dir(root.path());
        std::fs::create_dir_all(&dir).expect("create dir");
        std::fs::write(dir.join(CONFIG_FILE), "[search\ntop_docs = ").expect("write config");

        let err = load_project_config(root.path()).expect_err("parse must fail");
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn default_config_round_trips_through_disk() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        assert!(write_default_config(root.path()).expect("write"));
        assert!(!write_default_config(root.path()).expect("second write is a no-op"));

        let cfg = load_project_config(root.path()).expect("load");
        assert_eq!(cfg, ProjectConfig::default());
    }
}
