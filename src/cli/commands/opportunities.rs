//! crank opportunities - Hybrid search over contribution opportunities

use clap::Args;

use super::SearchArgs;
use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct OpportunitiesArgs {
    /// Search text (empty matches everything with a neutral score)
    #[arg(default_value = "")]
    pub query: String,

    #[command(flatten)]
    pub search: SearchArgs,
}

pub fn run(ctx: &AppContext, args: &OpportunitiesArgs) -> Result<()> {
    let params = args.search.params(&args.query, &ctx.config.search);
    let mut engine = ctx.engine()?;
    let results = engine.hybrid_search_opportunities(&params)?;
    output::emit_json(&output::ok(Some(engine.strategy()), results))
}
