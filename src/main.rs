//! Command-line entry point: capture polling daemon plus one-shot
//! decode/resolve/import tooling around the cellmon library.

use clap::Parser;

mod cli;

use cli::{init_logging, run_command, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run_command(cli).await {
        eprintln!("cellmon: {:#}", e);
        std::process::exit(1);
    }
}
