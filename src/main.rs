use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use rssagg::{
    commands,
    config::AppConfig,
    db,
    errors::AppResult,
    observability,
    tasks::{aggregator, types::parse_interval},
    DbPool,
};

/// Aggregate RSS feeds into a local database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a user who can own feeds
    Register { name: String },
    /// List registered users
    Users,
    /// Register a feed to be collected
    Addfeed {
        name: String,
        url: String,
        /// Name of the owning user
        #[arg(long)]
        owner: Option<String>,
    },
    /// List registered feeds
    Feeds,
    /// Collect feeds forever, one feed per interval (e.g. 30s, 1m, 1h30m)
    Agg { interval: String },
    /// Show the most recent posts
    Browse {
        #[arg(long, default_value_t = commands::DEFAULT_BROWSE_LIMIT)]
        limit: i64,
        /// Only show posts from this feed URL
        #[arg(long)]
        feed: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete all users, feeds and posts
    Reset,
}

fn main() -> ExitCode {
    dotenv().ok();
    observability::init_logging();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Command failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> AppResult<()> {
    let config = AppConfig::from_env()?;
    let pool = db::setup(&config.database_url)?;
    let mut stdout = io::stdout();

    match command {
        Command::Register { name } => {
            commands::register(&mut *pool.get()?, &name, &mut stdout).map(drop)
        }
        Command::Users => commands::users(&mut *pool.get()?, &mut stdout),
        Command::Addfeed { name, url, owner } => {
            commands::add_feed(&mut *pool.get()?, &name, &url, owner.as_deref(), &mut stdout)
                .map(drop)
        }
        Command::Feeds => commands::feeds(&mut *pool.get()?, &mut stdout),
        Command::Agg { interval } => {
            let interval = parse_interval(&interval)?;
            run_aggregator(pool, config, interval)
        }
        Command::Browse { limit, feed, json } => {
            commands::browse(&mut *pool.get()?, limit, feed.as_deref(), json, &mut stdout)
                .map(drop)
        }
        Command::Reset => commands::reset(&mut *pool.get()?, &mut stdout).map(drop),
    }
}

#[tokio::main]
async fn run_aggregator(pool: DbPool, config: AppConfig, interval: Duration) -> AppResult<()> {
    aggregator::start(pool, &config.fetch, interval).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_browse_defaults() {
        let cli = Cli::try_parse_from(["rssagg", "browse"]).unwrap();
        match cli.command {
            Command::Browse { limit, feed, json } => {
                assert_eq!(limit, 2);
                assert_eq!(feed, None);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_addfeed_arguments() {
        let cli = Cli::try_parse_from([
            "rssagg",
            "addfeed",
            "Lane",
            "https://wagslane.dev/index.xml",
            "--owner",
            "lane",
        ])
        .unwrap();
        match cli.command {
            Command::Addfeed { name, url, owner } => {
                assert_eq!(name, "Lane");
                assert_eq!(url, "https://wagslane.dev/index.xml");
                assert_eq!(owner.as_deref(), Some("lane"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_agg_requires_interval() {
        assert!(Cli::try_parse_from(["rssagg", "agg"]).is_err());
    }
}
