//! Paceline CLI entry point.

use paceline::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Run the demo driver
    cli::execute(cli).await
}
