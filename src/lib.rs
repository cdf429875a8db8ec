//! contrib-rank: hybrid lexical + vector ranking for contribution discovery.
//!
//! Ranks repositories, contribution opportunities and peer contributors
//! against a free-text query and an optional embedding vector. The same
//! ranking functions run unchanged over postgres (pgvector), an in-process
//! sqlite database or an in-memory mock.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod ranking;
pub mod scoring;
pub mod storage;

#[cfg(test)]
pub mod test_utils;

pub use error::{RankError, Result};
pub use ranking::{SearchEngine, SearchParams};
