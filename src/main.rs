// hubscout command line.
// Thin wrapper over the library client; results are printed as JSON.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use hubscout::clock::SystemClock;
use hubscout::{Result, Settings};

#[derive(Debug, Parser)]
#[command(name = "hubscout", version, about = "Query the GitHub API through a cached, rate-limit aware client")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Most-starred repositories for a language
    Repos { language: String },
    /// Public profile of a user
    User { username: String },
    /// Recently created repositories of a user
    UserRepos { username: String },
    /// Language byte counts for a repository ("owner/name")
    Languages { full_name: String },
    /// Current rate limit quota as reported upstream
    Limits,
    /// Drop every cached response
    ClearCache,
}

fn env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbosity {
            0 => EnvFilter::new("hubscout=info"),
            1 => EnvFilter::new("hubscout=debug"),
            _ => EnvFilter::new("hubscout=trace"),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(settings: &Settings, command: Command) -> Result<()> {
    let client = || settings.build_client();

    match command {
        Command::Repos { language } => {
            print_json(&client()?.get_repositories_by_language(&language).await?)
        }
        Command::User { username } => print_json(&client()?.get_user(&username).await?),
        Command::UserRepos { username } => {
            print_json(&client()?.get_user_repositories(&username).await?)
        }
        Command::Languages { full_name } => {
            print_json(&client()?.get_repository_languages(&full_name).await?)
        }
        Command::Limits => print_json(&client()?.rate_limit_status().await?),
        // Needs no credentials, so the cache is opened without a client
        Command::ClearCache => {
            settings.cache_store(Arc::new(SystemClock)).clear();
            tracing::info!("Response cache cleared");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match Settings::load() {
        Ok(settings) => run(&settings, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::debug!(kind = ?e.kind(), "Command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
