//! crank - contrib-rank CLI
//!
//! Rank repositories, contribution opportunities and contributors from the
//! command line. Every command prints one JSON envelope on stdout.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use contrib_rank::Result;
use contrib_rank::app::AppContext;
use contrib_rank::cli::{Cli, output};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let envelope = output::error(&e);
            match serde_json::to_string_pretty(&envelope) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("Error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    contrib_rank::cli::commands::run(&ctx, &cli.command)
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,contrib_rank=info",
        1 => "info,contrib_rank=debug",
        2 => "debug,contrib_rank=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
