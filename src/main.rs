//! cropwise command-line entry point.

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cropwise::cli::{Cli, execute};

fn init_logging(verbose: bool) {
    let default = if verbose { "cropwise=debug" } else { "cropwise=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so command output on stdout stays machine-readable.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = execute(&cli).context("command failed")?;
    if !output.is_empty() {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", output.trim_end()).context("failed to write output")?;
    }
    Ok(())
}
