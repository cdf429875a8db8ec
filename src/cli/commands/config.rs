//! crank config - Print the effective configuration

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output;
use crate::config::Config;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also print where the global configuration file is looked up
    #[arg(long)]
    pub paths: bool,
}

#[derive(Serialize)]
struct ConfigReport {
    config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    explicit_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    global_path: Option<String>,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    let report = ConfigReport {
        config: ctx.config.redacted(),
        explicit_path: ctx
            .config_path
            .as_ref()
            .map(|p| p.display().to_string()),
        global_path: if args.paths {
            Config::global_path().map(|p| p.display().to_string())
        } else {
            None
        },
    };
    output::emit_json(&output::ok(None, report))
}
