//! crank matches - Opportunities matching a user's preferences

use clap::Args;
use uuid::Uuid;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct MatchesArgs {
    /// User identifier
    pub user_id: Uuid,

    /// Minimum profile similarity for opportunities that carry embeddings
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f64,

    /// Maximum number of results
    #[arg(long, short, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

pub fn run(ctx: &AppContext, args: &MatchesArgs) -> Result<()> {
    let mut engine = ctx.engine()?;
    let results = engine.matching_opportunities_for_user(
        args.user_id,
        args.threshold,
        args.limit.unwrap_or(ctx.config.search.limit),
    )?;
    output::emit_json(&output::ok(Some(engine.strategy()), results))
}
