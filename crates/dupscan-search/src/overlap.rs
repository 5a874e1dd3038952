//! Symmetric overlap between two sets of embedding vectors.
//!
//! ```text
//! S[i][j]  = cos(target_i, candidate_j)
//! forward  = mean_i max_j S[i][j]
//! backward = mean_j max_i S[i][j]
//! overlap  = clamp(0.5 * (forward + backward), 0, 1)
//! ```
//!
//! Swapping the two sets gives the same score.

use dupscan_core::DupError;
use dupscan_core::model::EmbeddingVector;

const TARGET: &str = "target";
const CANDIDATE: &str = "candidate";

/// Overlap of `target` and `candidate` in `[0, 1]`.
///
/// `overlap(a, b) == overlap(b, a)` and `overlap(a, a) == 1.0`.
///
/// # Errors
///
/// - [`DupError::EmptyVectorSet`] if either set is empty
/// - [`DupError::DimensionMismatch`] if any vector differs in length from
///   the first target vector
/// - [`DupError::ZeroNormVector`] if any vector cannot be normalized
pub fn overlap(target: &[EmbeddingVector], candidate: &[EmbeddingVector]) -> Result<f32, DupError> {
    let dimension = target
        .first()
        .map(Vec::len)
        .ok_or(DupError::EmptyVectorSet(TARGET))?;
    if candidate.is_empty() {
        return Err(DupError::EmptyVectorSet(CANDIDATE));
    }

    let target = normalize_set(target, dimension, TARGET)?;
    let candidate = normalize_set(candidate, dimension, CANDIDATE)?;

    let mut row_best = vec![f32::NEG_INFINITY; target.len()];
    let mut col_best = vec![f32::NEG_INFINITY; candidate.len()];

    for (i, t) in target.iter().enumerate() {
        for (j, c) in candidate.iter().enumerate() {
            let sim = dot(t, c);
            row_best[i] = row_best[i].max(sim);
            col_best[j] = col_best[j].max(sim);
        }
    }

    let score = 0.5 * (mean(&row_best) + mean(&col_best));
    Ok(score.clamp(0.0, 1.0))
}

/// `v / |v|`, or `None` when `v` has zero (or non-finite) norm.
#[must_use]
pub fn normalize(v: &[f32]) -> Option<EmbeddingVector> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return None;
    }
    Some(v.iter().map(|x| x / norm).collect())
}

fn normalize_set(
    set: &[EmbeddingVector],
    dimension: usize,
    name: &'static str,
) -> Result<Vec<EmbeddingVector>, DupError> {
    set.iter()
        .enumerate()
        .map(|(index, v)| {
            if v.len() != dimension {
                return Err(DupError::DimensionMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
            normalize(v).ok_or(DupError::ZeroNormVector { set: name, index })
        })
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}
