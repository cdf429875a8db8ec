//! Scoring primitives and auxiliary scorers
//!
//! Every function here is pure: no I/O, no state carried across calls. The
//! ranking layer decides which candidates to feed in and what to do with the
//! numbers that come out.

pub mod health;
pub mod hybrid;
pub mod lexical;
pub mod trending;
pub mod vector;

pub use health::{HealthInputs, HealthScore};
pub use hybrid::{Limit, Weights, hybrid_score, normalize_threshold};
pub use lexical::{SearchableText, lexical_score};
pub use trending::trending_score;
pub use vector::cosine_similarity;
