use std::path::PathBuf;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::ranking::SearchEngine;
use crate::storage::Dataset;

/// Everything a subcommand needs: effective configuration plus the dataset
/// to load into a fresh connection.
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub dataset: Option<Dataset>,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(strategy) = &cli.backend {
            config.backend.strategy.clone_from(strategy);
        }

        let dataset = match &cli.dataset {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Some(Dataset::from_json(&raw)?)
            }
            None => None,
        };

        Ok(Self {
            config,
            config_path: cli.config.clone(),
            dataset,
            verbosity: cli.verbose,
        })
    }

    /// Acquire a connection and write the dataset through it.
    ///
    /// The dataset lives only as long as the engine: dropping it rolls back.
    pub fn engine(&self) -> Result<SearchEngine> {
        let mut engine = SearchEngine::connect(&self.config)?;
        if let Some(dataset) = &self.dataset {
            engine.load(dataset)?;
        }
        debug!(
            strategy = %engine.strategy(),
            dimensions = engine.dimensions(),
            "engine ready"
        );
        Ok(engine)
    }
}
