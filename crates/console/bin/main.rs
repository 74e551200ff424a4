#[macro_use]
extern crate tracing;

use clap::Parser;
use eyre::Result;

mod args;
mod cmd;
mod handler;

use args::{ConsoleArgs, ConsoleSubcommand};

fn main() -> Result<()> {
    handler::install();
    subscriber();
    let args = ConsoleArgs::parse();
    main_args(args).map_err(handler::with_suggestion)
}

#[tokio::main]
async fn main_args(args: ConsoleArgs) -> Result<()> {
    let config = args.config.load_config()?;
    match args.cmd.unwrap_or(ConsoleSubcommand::Console) {
        ConsoleSubcommand::Functions(cmd) => cmd.run(&config)?,
        ConsoleSubcommand::Accounts => cmd::accounts::run(config).await?,
        ConsoleSubcommand::Call(cmd) => cmd.run(config).await?,
        ConsoleSubcommand::Convert(cmd) => cmd.run(&config)?,
        ConsoleSubcommand::Console => cmd::console::run(config).await?,
    }
    Ok(())
}

/// Initializes a tracing subscriber filtered by `RUST_LOG`.
fn subscriber() {
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
