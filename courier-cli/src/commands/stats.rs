//! `courier stats`

use anyhow::Result;
use clap::Args;
use console::style;

use super::{Context, INFO};

/// Show queue depths
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Number of jobs waiting on each queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDepths {
    pub primary: usize,
    pub dead_letter: usize,
}

impl StatsCommand {
    /// Execute the stats command
    ///
    /// # Errors
    ///
    /// Returns an error if a queue cannot be read.
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let depths = Self::depths(ctx).await?;
        let queue = &ctx.config.queue;

        if self.json {
            let value = serde_json::json!({
                (queue.name.as_str()): depths.primary,
                (queue.dead_letter.as_str()): depths.dead_letter,
            });
            println!("{value}");
            return Ok(());
        }

        println!("\n{INFO} Queue depths");
        println!();
        println!("{:<30} {:>10}", "Queue", "Jobs");
        println!("{}", "─".repeat(41));
        println!("{:<30} {:>10}", queue.name, depths.primary);

        let dead = if depths.dead_letter == 0 {
            style(depths.dead_letter).green()
        } else {
            style(depths.dead_letter).red()
        };
        println!("{:<30} {:>10}", queue.dead_letter, dead);
        println!();
        Ok(())
    }

    async fn depths(ctx: &Context) -> Result<QueueDepths> {
        Ok(QueueDepths {
            primary: ctx.queue.len(&ctx.config.queue.name).await?,
            dead_letter: ctx.queue.len(&ctx.config.queue.dead_letter).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::memory_context;
    use courier::{DurableQueue, Job};
    use serde_json::json;

    #[tokio::test]
    async fn test_depths_counts_both_queues() {
        let (ctx, queue, _) = memory_context();
        let job = Job::new("a", "t", json!({}), 3);
        queue.enqueue("jobs", &job).await.unwrap();
        queue.enqueue("jobs", &job).await.unwrap();
        queue.enqueue("jobs:dead", &job).await.unwrap();

        let depths = StatsCommand::depths(&ctx).await.unwrap();

        assert_eq!(
            depths,
            QueueDepths {
                primary: 2,
                dead_letter: 1
            }
        );
    }
}
