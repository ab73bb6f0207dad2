//! docker_build module entry point
//!
//! Invoked by the automation runner with the path of a JSON argument file.
//! Writes a single JSON result to stdout; logs go to stderr.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use dockmod_core::Response;
use tracing_subscriber::EnvFilter;

mod commands;

/// Build a Docker image from a directory or gzip archive
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// JSON file holding the module arguments
    #[arg(value_name = "ARGS_FILE")]
    args_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Argument errors are reported through the result envelope, not clap's usage text
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => Response::failure(format!("Invalid module invocation: {e}")).fail_json(),
    };

    setup_logging(cli.verbose, cli.quiet);

    let Some(args_file) = cli.args_file else {
        Response::failure(dockmod_core::Error::MissingArgumentFile.to_string()).fail_json()
    };

    let response = commands::BuildCommand::new(args_file).execute().await;
    if response.failed {
        response.fail_json()
    } else {
        response.exit_json()
    }
}

fn setup_logging(verbose: u8, quiet: u8) {
    let log_level = match (verbose, quiet) {
        (0, 0) => "warn",
        (1, 0) => "info",
        (2, 0) => "debug",
        (v, 0) if v > 2 => "trace",
        (0, 1) => "error",
        (0, _) => "off",
        _ => "warn",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}
