//! Caller-facing search parameters and their validated form.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::scoring::vector::check_dimensions;
use crate::scoring::{Limit, Weights, normalize_threshold};

const DEFAULT_LIMIT: i64 = 20;

/// Raw arguments of a hybrid search, exactly as a caller supplies them.
///
/// Nothing is checked until the search runs; see [`SearchParams::validate`].
#[derive(Debug, Clone, Copy)]
pub struct SearchParams<'a> {
    pub text: &'a str,
    pub vector: Option<&'a [f32]>,
    pub text_weight: f64,
    pub vector_weight: f64,
    pub threshold: f64,
    pub limit: i64,
}

impl<'a> SearchParams<'a> {
    pub const fn new(text: &'a str) -> Self {
        Self {
            text,
            vector: None,
            text_weight: 0.5,
            vector_weight: 0.5,
            threshold: 0.0,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Weights, threshold and limit taken from configuration.
    pub const fn from_config(text: &'a str, config: &SearchConfig) -> Self {
        Self {
            text,
            vector: None,
            text_weight: config.text_weight,
            vector_weight: config.vector_weight,
            threshold: config.threshold,
            limit: config.limit,
        }
    }

    #[must_use]
    pub const fn vector(mut self, vector: Option<&'a [f32]>) -> Self {
        self.vector = vector;
        self
    }

    #[must_use]
    pub const fn weights(mut self, text: f64, vector: f64) -> Self {
        self.text_weight = text;
        self.vector_weight = vector;
        self
    }

    #[must_use]
    pub const fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Weights first, then the limit, then the query vector width.
    pub fn validate(&self, dimensions: usize) -> Result<ValidatedSearch<'a>> {
        let weights = Weights::new(self.text_weight, self.vector_weight)?;
        let limit = Limit::new(self.limit)?;
        if let Some(vector) = self.vector {
            check_dimensions(vector, dimensions)?;
        }
        Ok(ValidatedSearch {
            text: self.text,
            vector: self.vector,
            weights,
            threshold: normalize_threshold(self.threshold),
            limit,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValidatedSearch<'a> {
    pub text: &'a str,
    pub vector: Option<&'a [f32]>,
    pub weights: Weights,
    pub threshold: f64,
    pub limit: Limit,
}
