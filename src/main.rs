mod auth;
mod cli;
mod config;
mod engine;
mod error;
mod http;
mod output;
mod types;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use config::{load_config, merge_config};
use output::print_summary;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug() { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_file(cli.debug())
        .with_line_number(cli.debug())
        .init();

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32, String> {
    match cli.command {
        Commands::Run(args) => run_probe(&args).await,
        Commands::Init(args) => run_init(&args),
        Commands::Completions(args) => {
            cli::generate_completions(args.shell);
            Ok(0)
        }
    }
}

async fn run_probe(args: &RunArgs) -> Result<i32, String> {
    tracing::info!(debug_enabled = args.debug, "Starting probe service");

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(file = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {
            tracing::debug!("No .env file found, using process environment")
        }
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    let toml = load_config(&args.config).map_err(|e| e.to_string())?;
    let config = merge_config(args, toml).map_err(|e| e.to_string())?;
    tracing::info!(file = %args.config.display(), "Config loaded successfully");

    if args.dry_run {
        eprintln!("Configuration validated successfully!\n");
        eprintln!("Endpoints:   {}", config.endpoints.len());
        for endpoint in &config.endpoints {
            eprintln!("  {} {}", endpoint.method.to_uppercase(), endpoint.url);
        }
        eprintln!("Concurrency: {}", config.concurrency);
        eprintln!("Repetitions: {}", config.total_requests);
        eprintln!("Total jobs:  {}", config.total_jobs());
        eprintln!("Timeout:     {}ms", config.timeout.as_millis());
        eprintln!("Auth:        {}", config.auth.as_str());
        return Ok(0);
    }

    let cancel_token = CancellationToken::new();
    tokio::spawn(watch_shutdown(cancel_token.clone()));

    let summary = engine::run(cancel_token, config)
        .await
        .map_err(|e| e.to_string())?;

    print_summary(&summary).map_err(|e| format!("Failed to print summary: {}", e))?;
    tracing::info!("Probe execution completed");

    Ok(0)
}

async fn watch_shutdown(cancel_token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::warn!("Shutdown signal received, exiting gracefully...");
    cancel_token.cancel();
}

fn run_init(args: &cli::InitArgs) -> Result<i32, String> {
    use std::fs;

    if args.output.exists() && !args.force {
        return Err(format!(
            "File '{}' already exists. Use --force to overwrite.",
            args.output.display()
        ));
    }

    let url = args
        .url
        .as_deref()
        .unwrap_or("https://api.example.com/health");

    let config = format!(
        r#"# Scouter Probe Configuration

# Global authentication, applied to every endpoint without its own [probe.endpoints.auth]
[auth]
enabled = false
# type = "api_key"     # api_key | basic | oauth2
#
# [auth.api_key]
# header = "X-API-Key"
# value = "${{API_KEY}}"
#
# [auth.basic]
# username = "${{API_USER}}"
# password = "${{API_PASSWORD}}"
#
# [auth.oauth2]
# token_url = "https://auth.example.com/oauth/token"
# client_id = "${{CLIENT_ID}}"
# client_secret = "${{CLIENT_SECRET}}"
# grant_type = "client_credentials"
# scope = "read"

[probe]
concurrent_requests = 5
total_requests = 20     # repetitions per endpoint
request_timeout_ms = 2000
# connect_timeout = "2s"
# token_cache_ttl = "5m"  # reuse OAuth2 tokens instead of one exchange per request

[probe.delay_between]
enabled = false
type = "fixed"          # fixed | random
fixed = 100
# min = 50              # random: uniform in [min, max) ms
# max = 250

[[probe.endpoints]]
url = "{url}"
method = "GET"

# [[probe.endpoints]]
# url = "https://api.example.com/users"
# method = "POST"
# body = '{{"name": "test"}}'
#
# [probe.endpoints.headers]
# Content-Type = "application/json"
#
# [probe.endpoints.auth]
# enabled = false       # suppress global auth for this endpoint
"#,
        url = url
    );

    fs::write(&args.output, config).map_err(|e| format!("Failed to write config file: {}", e))?;

    eprintln!("Created config file: {}", args.output.display());
    eprintln!("\nRun with: scouter run -f {}", args.output.display());

    Ok(0)
}
