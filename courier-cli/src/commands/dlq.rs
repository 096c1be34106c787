//! Dead-letter queue commands
//!
//! - `list` - Show the oldest dead-lettered jobs
//! - `replay` - Move jobs back to the primary queue with a fresh attempt budget
//! - `purge` - Drop every dead-lettered job

use anyhow::Result;
use clap::Subcommand;
use console::style;
use courier::DeadLetters;

use super::{job_row, Context, INFO, SUCCESS, WARN};

/// Dead-letter queue commands
#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// Show the oldest dead-lettered jobs
    List {
        /// Number of jobs to show
        #[arg(long, short, default_value = "10")]
        limit: usize,
    },

    /// Move jobs back to the primary queue
    Replay {
        /// Maximum number of jobs to replay
        #[arg(long, short, default_value_t = usize::MAX, hide_default_value = true)]
        max: usize,
    },

    /// Drop every dead-lettered job
    Purge {
        /// Confirm the purge
        #[arg(long, short)]
        yes: bool,
    },
}

impl DlqCommand {
    /// Execute the dead-letter command
    ///
    /// # Errors
    ///
    /// Returns an error if the queues or the idempotency store cannot be reached.
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let dead_letters = DeadLetters::new(ctx.queue.clone(), ctx.idempotency.clone(), &ctx.config);

        match self {
            Self::List { limit } => Self::list(&dead_letters, *limit).await,
            Self::Replay { max } => {
                let replayed = dead_letters.replay(*max).await?;
                println!(
                    "{SUCCESS} Replayed {} job(s) to {}",
                    style(replayed.len()).bold(),
                    style(&ctx.config.queue.name).cyan(),
                );
                Ok(())
            }
            Self::Purge { yes } => {
                if !yes {
                    let count = dead_letters.count().await?;
                    println!(
                        "{WARN} This drops {} job(s) for good. Re-run with --yes to confirm.",
                        style(count).bold()
                    );
                    return Ok(());
                }
                let removed = dead_letters.purge().await?;
                println!("{SUCCESS} Purged {} job(s)", style(removed).bold());
                Ok(())
            }
        }
    }

    async fn list(dead_letters: &DeadLetters, limit: usize) -> Result<()> {
        let total = dead_letters.count().await?;
        let jobs = dead_letters.list(limit).await?;

        println!("\n{INFO} Dead-letter queue ({total} job(s))");
        println!();
        if jobs.is_empty() {
            println!("  {}", style("empty").dim());
            println!();
            return Ok(());
        }

        println!(
            "{:<38} {:<16} {:>7} {:<20} {}",
            "ID", "Type", "Tries", "Created", "Last error"
        );
        println!("{}", "─".repeat(100));
        for job in &jobs {
            println!("{}", job_row(job));
        }
        if total > jobs.len() {
            println!("{}", style(format!("... {} more", total - jobs.len())).dim());
        }
        println!();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::memory_context;
    use courier::{DurableQueue, IdempotencyStore, Job};
    use serde_json::json;
    use std::time::Duration;

    async fn dead_job(queue: &impl DurableQueue, id: &str) {
        let mut job = Job::new(id, "t", json!({}), 1);
        job.record_failure("boom");
        queue.enqueue("jobs:dead", &job).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_without_confirmation_keeps_jobs() {
        let (ctx, queue, _) = memory_context();
        dead_job(&queue, "a").await;

        DlqCommand::Purge { yes: false }.execute(&ctx).await.unwrap();
        assert_eq!(queue.len("jobs:dead").await.unwrap(), 1);

        DlqCommand::Purge { yes: true }.execute(&ctx).await.unwrap();
        assert_eq!(queue.len("jobs:dead").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replay_moves_jobs_and_releases_claims() {
        let (ctx, queue, store) = memory_context();
        dead_job(&queue, "a").await;
        dead_job(&queue, "b").await;
        store.claim("idem:a", Duration::from_secs(60)).await.unwrap();

        DlqCommand::Replay { max: 1 }.execute(&ctx).await.unwrap();

        assert_eq!(queue.len("jobs:dead").await.unwrap(), 1);
        let primary = queue.peek("jobs", 10).await.unwrap();
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].id, "a");
        assert_eq!(primary[0].attempts, 0);
        assert!(!store.is_claimed("idem:a"));
    }

    #[tokio::test]
    async fn test_list_leaves_queue_untouched() {
        let (ctx, queue, _) = memory_context();
        dead_job(&queue, "a").await;

        DlqCommand::List { limit: 10 }.execute(&ctx).await.unwrap();
        assert_eq!(queue.len("jobs:dead").await.unwrap(), 1);
    }
}
