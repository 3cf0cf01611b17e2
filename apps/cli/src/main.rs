//! doccrawl CLI: crawl documentation sites into structured extraction records.
//!
//! Discovers pages through `llms.txt` or by crawling, extracts headings, prose,
//! code samples and links, and stores accepted records in a local database.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
