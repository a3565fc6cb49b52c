use clap::Parser;

use mpvm::cli::Cli;
use mpvm::config::LaunchConfig;
use mpvm::flow;
use mpvm::logging;
use mpvm::progress::OutputMode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    // Usage errors exit 2 and help exits 0, both from clap.
    let cli = Cli::parse();

    let mode = OutputMode::detect(cli.verbose);
    logging::init(mode, cli.verbose);

    let config = LaunchConfig::from_cli(cli)?;
    tracing::debug!(?config, "resolved configuration");

    flow::run(&config, mode).await?;
    Ok(())
}
