use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scouter",
    author,
    version,
    about = "A concurrent HTTP load prober with per-endpoint auth overrides",
    long_about = "scouter fires a fixed number of HTTP requests at a set of endpoints with \
                  bounded concurrency, then reports success counts and latency."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a probe described by a config file
    Run(RunArgs),

    /// Generate a starter config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Path to the probe configuration file
    #[arg(short = 'f', long, default_value = "probe_config.toml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Number of concurrent workers (overrides config)
    #[arg(short = 'c', long)]
    pub concurrency: Option<u32>,

    /// Repetitions per endpoint (overrides config)
    #[arg(short = 'n', long)]
    pub total_requests: Option<u32>,

    /// Per-request timeout in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Validate the configuration and exit without sending requests
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output file path
    #[arg(short = 'o', long, default_value = "probe_config.toml")]
    pub output: PathBuf,

    /// Target URL to pre-fill
    pub url: Option<String>,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "scouter", &mut std::io::stdout());
}

impl Cli {
    pub fn debug(&self) -> bool {
        matches!(&self.command, Commands::Run(args) if args.debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_overrides_parse() {
        let cli = Cli::parse_from([
            "scouter", "run", "-f", "custom.toml", "-c", "4", "-n", "10", "--timeout-ms", "500",
            "--debug",
        ]);
        assert!(cli.debug());

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("custom.toml"));
        assert_eq!(args.concurrency, Some(4));
        assert_eq!(args.total_requests, Some(10));
        assert_eq!(args.timeout_ms, Some(500));
        assert!(!args.dry_run);
    }

    #[test]
    fn run_defaults_to_probe_config() {
        let cli = Cli::parse_from(["scouter", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("probe_config.toml"));
        assert_eq!(args.concurrency, None);
    }
}
