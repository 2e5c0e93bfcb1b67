//! storyverse: command-line front end for the story library.

mod args;
mod commands;
mod context;
mod error;
mod io;
mod logging;
mod print;
mod selection;


use clap::Parser;
use storyverse_core::StoryverseConfig;

use args::Cli;
use context::App;
use error::CliError;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = StoryverseConfig::load(cli.config.as_deref())?;
    logging::init_logging(&config.logging)?;

    let mut app = App::open(config).await;
    let result = commands::handle(&mut app, cli.command).await;
    app.shutdown().await;

    if let Err(e) = &result {
        tracing::debug!(error = %e, "Command failed");
    }
    result
}
