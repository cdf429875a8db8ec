//! crank users - Contributors with a similar profile

use clap::Args;

use crate::app::AppContext;
use crate::cli::output;
use crate::cli::{QueryVector, parse_vector};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct UsersArgs {
    /// Profile embedding to compare against, comma-separated
    #[arg(long, value_parser = parse_vector)]
    pub vector: QueryVector,

    /// Minimum similarity to keep
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Maximum number of results
    #[arg(long, short, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

pub fn run(ctx: &AppContext, args: &UsersArgs) -> Result<()> {
    let defaults = &ctx.config.search;
    let mut engine = ctx.engine()?;
    let results = engine.search_similar_users(
        args.vector.as_slice(),
        args.threshold.unwrap_or(defaults.threshold),
        args.limit.unwrap_or(defaults.limit),
    )?;
    output::emit_json(&output::ok(Some(engine.strategy()), results))
}
