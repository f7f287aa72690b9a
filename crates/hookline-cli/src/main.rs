// Hookline CLI Entry Point

use std::process::ExitCode;

use clap::Parser;
use hookline_cli::{logging, output, router::Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    match hookline_cli::router::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
