//! grayline CLI - load, resize, grayscale and save images through a
//! concurrent, fail-fast pipeline.
//!
//! Each stage runs as its own worker, connected to the next by a bounded
//! channel. The first error anywhere aborts the run and is reported once.
//!
//! # Usage
//!
//! ```bash
//! # Process two images into images/output/
//! grayline run images/a.jpg images/b.jpg
//!
//! # Process a directory, one JSON object per result
//! grayline run images/ --format jsonl
//!
//! # Only convert to grayscale, keeping the original size
//! grayline run images/ --stages grayscale
//!
//! # View configuration
//! grayline config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// grayline - concurrent load, resize, grayscale and save pipeline for images.
#[derive(Parser, Debug)]
#[command(name = "grayline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run images through the pipeline
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match grayline_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `grayline config path`."
            );
            grayline_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("grayline v{}", grayline_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::try_parse_from(["grayline", "run", "a.jpg", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run(ref args) if args.paths.len() == 1));
    }

    #[test]
    fn config_init_accepts_force() {
        let cli = Cli::try_parse_from(["grayline", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(cli::config::ConfigArgs {
                command: cli::config::ConfigCommand::Init { force: true }
            })
        ));
    }
}
