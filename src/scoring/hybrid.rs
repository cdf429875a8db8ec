//! Hybrid relevance scorer
//!
//! Fuses a lexical score and an optional vector score under caller weights.
//! Weight and limit validation live here as constructors so an invalid call is
//! rejected before any candidate is read.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};

/// Validated pair of relevance weights.
///
/// Both finite, both non-negative, not both zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    text: f64,
    vector: f64,
}

impl Weights {
    pub fn new(text: f64, vector: f64) -> Result<Self> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(text) || !valid(vector) || (text == 0.0 && vector == 0.0) {
            return Err(RankError::InvalidWeights { text, vector });
        }
        Ok(Self { text, vector })
    }

    /// Text-only weighting.
    pub const fn lexical_only() -> Self {
        Self {
            text: 1.0,
            vector: 0.0,
        }
    }

    /// Vector-only weighting.
    pub const fn vector_only() -> Self {
        Self {
            text: 0.0,
            vector: 1.0,
        }
    }

    pub const fn text(&self) -> f64 {
        self.text
    }

    pub const fn vector(&self) -> f64 {
        self.vector
    }
}

/// Validated positive result cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(NonZeroUsize);

impl Limit {
    pub fn new(limit: i64) -> Result<Self> {
        usize::try_from(limit)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or(RankError::InvalidLimit(limit))
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

/// Bring a caller threshold into [0, 1]; NaN keeps everything.
pub fn normalize_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        0.0
    } else {
        threshold.clamp(0.0, 1.0)
    }
}

/// Weighted relevance in [0, 1].
///
/// A zero-weighted component is excluded outright, even when its score is
/// present. When the vector component carries weight but the candidate (or the
/// query) has no vector, the lexical score stands in for it.
pub fn hybrid_score(weights: Weights, lexical: f64, vector: Option<f64>) -> f64 {
    let mut total = 0.0;
    let mut applied = 0.0;

    if weights.text > 0.0 {
        total += weights.text * lexical;
        applied += weights.text;
    }
    if weights.vector > 0.0 {
        total += weights.vector * vector.unwrap_or(lexical);
        applied += weights.vector;
    }

    if applied == 0.0 {
        return 0.0;
    }
    let score = total / applied;
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}
