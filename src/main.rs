//! Alzheimer's diagnosis model comparison - main entry point

use alzheimer_ml::cli::{cmd_config, cmd_info, cmd_run, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alzheimer_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => cmd_run(&args)?,
        Some(Commands::Info { data, target, head }) => cmd_info(&data, &target, head)?,
        Some(Commands::Config(args)) => cmd_config(&args)?,
        None => cmd_run(&cli.run)?,
    }

    Ok(())
}
