//! crank repositories - Hybrid search over repositories

use clap::Args;

use super::SearchArgs;
use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct RepositoriesArgs {
    /// Search text
    #[arg(default_value = "")]
    pub query: String,

    #[command(flatten)]
    pub search: SearchArgs,
}

pub fn run(ctx: &AppContext, args: &RepositoriesArgs) -> Result<()> {
    let params = args.search.params(&args.query, &ctx.config.search);
    let mut engine = ctx.engine()?;
    let results = engine.hybrid_search_repositories(&params)?;
    output::emit_json(&output::ok(Some(engine.strategy()), results))
}
