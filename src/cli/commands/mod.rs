//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::{Args, Subcommand};

pub mod config;
pub mod health;
pub mod matches;
pub mod opportunities;
pub mod repositories;
pub mod trending;
pub mod users;

use crate::app::AppContext;
use crate::cli::{QueryVector, parse_vector};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::ranking::SearchParams;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Opportunities(args) => opportunities::run(ctx, args),
        Commands::Repositories(args) => repositories::run(ctx, args),
        Commands::Users(args) => users::run(ctx, args),
        Commands::Trending(args) => trending::run(ctx, args),
        Commands::Health(args) => health::run(ctx, args),
        Commands::Matches(args) => matches::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hybrid search over contribution opportunities
    Opportunities(opportunities::OpportunitiesArgs),

    /// Hybrid search over repositories
    Repositories(repositories::RepositoriesArgs),

    /// Find contributors with a similar profile embedding
    Users(users::UsersArgs),

    /// Recently popular opportunities
    Trending(trending::TrendingArgs),

    /// Health metrics for one repository
    Health(health::HealthArgs),

    /// Open opportunities matching a user's preferences
    Matches(matches::MatchesArgs),

    /// Print the effective configuration
    Config(config::ConfigArgs),
}

/// Options shared by the hybrid search commands. Unset values come from `[search]`.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Query embedding, comma-separated
    #[arg(long, value_parser = parse_vector)]
    pub vector: Option<QueryVector>,

    /// Weight of the lexical component
    #[arg(long)]
    pub text_weight: Option<f64>,

    /// Weight of the vector component
    #[arg(long)]
    pub vector_weight: Option<f64>,

    /// Minimum relevance score to keep
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Maximum number of results
    #[arg(long, short, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

impl SearchArgs {
    pub fn params<'a>(&'a self, query: &'a str, defaults: &SearchConfig) -> SearchParams<'a> {
        SearchParams::from_config(query, defaults)
            .vector(self.vector.as_ref().map(QueryVector::as_slice))
            .weights(
                self.text_weight.unwrap_or(defaults.text_weight),
                self.vector_weight.unwrap_or(defaults.vector_weight),
            )
            .threshold(self.threshold.unwrap_or(defaults.threshold))
            .limit(self.limit.unwrap_or(defaults.limit))
    }
}
