use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use bulkgraph::cli::{Cli, Commands};
use bulkgraph::commands;
use bulkgraph::error::LoadError;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        match err.downcast_ref::<LoadError>() {
            Some(load_err) => error!(code = load_err.code(), error = %err, "command failed"),
            None => error!(error = %err, "command failed"),
        }
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bootstrap(args) => commands::bootstrap::run(args),
        Commands::Load(args) => commands::load::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
