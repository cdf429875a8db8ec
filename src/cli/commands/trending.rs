//! crank trending - Recently popular opportunities

use clap::Args;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct TrendingArgs {
    /// Only opportunities created within this many hours
    #[arg(long)]
    pub window_hours: Option<u32>,

    /// Minimum views + applications
    #[arg(long)]
    pub min_engagement: Option<i64>,

    /// Maximum number of results
    #[arg(long, short, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

pub fn run(ctx: &AppContext, args: &TrendingArgs) -> Result<()> {
    let defaults = &ctx.config.trending;
    let mut engine = ctx.engine()?;
    let results = engine.trending_opportunities(
        args.window_hours.unwrap_or(defaults.window_hours),
        args.min_engagement.unwrap_or(defaults.min_engagement),
        args.limit.unwrap_or(defaults.limit),
    )?;
    output::emit_json(&output::ok(Some(engine.strategy()), results))
}
