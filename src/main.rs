use brickops::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Configuration file, environment, then command line overrides
    let config = cli.load_config()?;

    // Initialize logging
    cli.init_logging(&config)?;

    // Execute command
    cli.execute(&config).await?;

    Ok(())
}
