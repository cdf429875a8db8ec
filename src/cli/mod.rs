//! `crank` command-line front end

use std::path::PathBuf;

use clap::Parser;

pub mod commands;
pub mod output;

pub use commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "crank", version, about = "Rank repositories, opportunities and contributors")]
pub struct Cli {
    /// Configuration file (replaces the global one)
    #[arg(long, global = true, env = "CRANK_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON dataset loaded into the connection before the command runs
    #[arg(long, global = true, env = "CRANK_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Backend strategy: auto, postgres, sqlite or mock
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress logs entirely
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Embedding given on the command line as comma-separated numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector(pub Vec<f32>);

impl QueryVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Parse `0.1,0.2,0.3` (brackets optional).
pub fn parse_vector(raw: &str) -> std::result::Result<QueryVector, String> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Err("vector must not be empty".to_string());
    }
    inner
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f32>()
                .map_err(|err| format!("invalid vector component {part:?}: {err}"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(QueryVector)
}
