//! Courier CLI - operate a courier deployment.
//!
//! Usage:
//!   courier submit --type email --payload '{"to":"a@example.com"}'
//!   courier stats
//!   courier dlq list --limit 20
//!   courier dlq replay --max 10
//!   courier dlq purge --yes

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{Context, DlqCommand, StatsCommand, SubmitCommand};
use courier::{CourierConfig, RedisIdempotencyStore, RedisQueue};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(version)]
#[command(about = "Submit jobs and manage the courier queues", long_about = None)]
struct Cli {
    /// Extra TOML file merged over config/default.toml and config/local.toml
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Put a job on the primary queue
    Submit(SubmitCommand),

    /// Show queue depths
    Stats(StatsCommand),

    /// Inspect and drain the dead-letter queue
    #[command(subcommand)]
    Dlq(DlqCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CourierConfig::load_with(cli.config.as_deref())?;

    let ctx = Context {
        queue: Arc::new(RedisQueue::connect(&config.redis.url).await?),
        idempotency: Arc::new(RedisIdempotencyStore::connect(&config.redis.url).await?),
        config,
    };

    match cli.command {
        Command::Submit(cmd) => cmd.execute(&ctx).await,
        Command::Stats(cmd) => cmd.execute(&ctx).await,
        Command::Dlq(cmd) => cmd.execute(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from([
            "courier",
            "submit",
            "--type",
            "email",
            "--payload",
            r#"{"to":"a@example.com"}"#,
            "--key",
            "order-42",
        ])
        .unwrap();

        let Command::Submit(cmd) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(cmd.job_type, "email");
        assert_eq!(cmd.key.as_deref(), Some("order-42"));
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["courier", "dlq", "list", "--config", "prod.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("prod.toml")));
        assert!(matches!(cli.command, Command::Dlq(DlqCommand::List { limit: 10 })));
    }

    #[test]
    fn test_parse_purge_is_unconfirmed_by_default() {
        let cli = Cli::try_parse_from(["courier", "dlq", "purge"]).unwrap();
        assert!(matches!(cli.command, Command::Dlq(DlqCommand::Purge { yes: false })));
    }
}
