//! eden-cli: call procedures on a batch endpoint from the shell.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;
mod handlers;
mod io;
mod print;


use clap::Parser;
use eden_query::config;
use eden_query::infra::telemetry;

use args::{Cli, Commands};
use client::{CliError, Ctx};
use handlers::{batch, call, pages};
use print::print_json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = config::load(&cli.config)?;
    telemetry::init(&settings.logging)?;
    let ctx = Ctx::new(&settings, io::parse_headers(&cli.headers)?)?;

    let output = match &cli.command {
        Commands::Call(cmd) => call::call(&ctx, cmd).await?,
        Commands::Mutate(cmd) => call::mutate(&ctx, cmd).await?,
        Commands::Batch(cmd) => batch::handle(&ctx, cmd).await?,
        Commands::Pages(cmd) => pages::handle(&ctx, cmd).await?,
    };

    print_json(&output)
}
