//! crank health - Repository health metrics

use clap::Args;
use uuid::Uuid;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Repository identifier
    pub repository_id: Uuid,
}

pub fn run(ctx: &AppContext, args: &HealthArgs) -> Result<()> {
    let mut engine = ctx.engine()?;
    let report = engine.repository_health_metrics(args.repository_id)?;
    output::emit_json(&output::ok(Some(engine.strategy()), report))
}
