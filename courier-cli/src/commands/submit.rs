//! `courier submit`

use anyhow::{Context as _, Result};
use clap::Args;
use console::style;
use courier::{Ingress, Job, Submission};
use serde_json::Value;

use super::{Context, SUCCESS};

/// Put a job on the primary queue
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Job type, passed through to the persistence sink
    #[arg(long = "type", short = 't')]
    pub job_type: String,

    /// JSON payload
    #[arg(long, short, default_value = "{}")]
    pub payload: String,

    /// Idempotency key, used as the job id
    #[arg(long, short)]
    pub key: Option<String>,
}

impl SubmitCommand {
    /// Execute the submit command
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON or the job cannot be enqueued.
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let job = self.submit(ctx).await?;

        println!(
            "{SUCCESS} Submitted {} job {} to {}",
            style(&job.job_type).cyan(),
            style(&job.id).bold(),
            style(&ctx.config.queue.name).dim(),
        );
        Ok(())
    }

    async fn submit(&self, ctx: &Context) -> Result<Job> {
        let payload: Value =
            serde_json::from_str(&self.payload).context("Payload is not valid JSON")?;

        let mut submission = Submission::new(self.job_type.as_str(), payload);
        if let Some(key) = &self.key {
            submission = submission.with_idempotency_key(key.as_str());
        }

        let ingress = Ingress::new(
            ctx.queue.clone(),
            ctx.config.queue.name.as_str(),
            ctx.config.retry.max_attempts,
        );
        Ok(ingress.submit(submission).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::memory_context;
    use courier::DurableQueue;

    fn command(payload: &str, key: Option<&str>) -> SubmitCommand {
        SubmitCommand {
            job_type: "email".to_string(),
            payload: payload.to_string(),
            key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_submit_enqueues_with_configured_budget() {
        let (ctx, queue, _) = memory_context();

        let job = command(r#"{"to":"a@example.com"}"#, Some("order-42"))
            .submit(&ctx)
            .await
            .unwrap();

        assert_eq!(job.id, "order-42");
        assert_eq!(job.max_attempts, ctx.config.retry.max_attempts);
        let queued = queue.peek("jobs", 10).await.unwrap();
        assert_eq!(queued, vec![job]);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let (ctx, queue, _) = memory_context();

        let err = command("{not json", None).submit(&ctx).await.unwrap_err();

        assert!(err.to_string().contains("not valid JSON"));
        assert_eq!(queue.len("jobs").await.unwrap(), 0);
    }
}
