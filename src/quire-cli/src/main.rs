//! quire - run commands of a declarative manifest.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quire_cli::args::Args;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "QUIRE_LOG";

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(args.level().as_filter_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let result = quire_cli::run(&args)
        .await
        .and_then(|value| quire_cli::render(&value, args.pretty));

    match result {
        Ok(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
