//! Vector similarity primitive and embedding codecs
//!
//! Cosine similarity bounded to [0, 1]. Opposed or orthogonal directions both
//! land on 0; identical directions on 1. Each storage strategy either calls
//! [`cosine_similarity`] directly (mock), wraps it in a scalar SQL function
//! (sqlite) or uses the engine's native operator with the same clamp (postgres).

use crate::error::{RankError, Result};

/// Cosine similarity clamped to [0, 1].
///
/// Fails with [`RankError::DimensionMismatch`] when the lengths differ. A zero
/// vector has no direction and scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RankError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    if cosine.is_nan() {
        return Ok(0.0);
    }
    Ok(cosine.clamp(0.0, 1.0))
}

/// Similarity against an optional stored vector; `None` when either side is absent.
pub fn optional_similarity(query: Option<&[f32]>, stored: Option<&[f32]>) -> Result<Option<f64>> {
    match (query, stored) {
        (Some(query), Some(stored)) => cosine_similarity(query, stored).map(Some),
        _ => Ok(None),
    }
}

/// Fail fast when a caller-supplied vector does not have the configured width.
pub fn check_dimensions(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(RankError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}

// =============================================================================
// Codecs
// =============================================================================

/// Little-endian f32 blob, the embedded engine's storage form.
pub fn to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn from_blob(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RankError::Serialization(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// pgvector text literal: `[0.1,0.2,0.3]`.
pub fn to_pg_text(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 8 + 2);
    out.push('[');
    for (idx, value) in vector.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out.push(']');
    out
}

pub fn from_pg_text(text: &str) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| RankError::Serialization(format!("malformed vector literal {text:?}")))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|err| RankError::Serialization(format!("vector component {part:?}: {err}")))
        })
        .collect()
}
