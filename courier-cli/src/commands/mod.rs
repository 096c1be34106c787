//! CLI command implementations

pub mod dlq;
pub mod stats;
pub mod submit;

pub use dlq::DlqCommand;
pub use stats::StatsCommand;
pub use submit::SubmitCommand;

use std::sync::Arc;

use console::Emoji;
use courier::{CourierConfig, DurableQueue, IdempotencyStore, Job};

pub static SUCCESS: Emoji<'_, '_> = Emoji("✓", "√");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ", "i");
pub static WARN: Emoji<'_, '_> = Emoji("⚠", "!");

/// Backends and configuration shared by every command.
pub struct Context {
    pub queue: Arc<dyn DurableQueue>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub config: CourierConfig,
}

/// One table row per job.
pub fn job_row(job: &Job) -> String {
    format!(
        "{:<38} {:<16} {:>3}/{:<3} {:<20} {}",
        job.id,
        job.job_type,
        job.attempts,
        job.max_attempts,
        job.created_at.format("%Y-%m-%d %H:%M:%S"),
        job.last_error.as_deref().unwrap_or("-"),
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_row_shows_attempts_and_error() {
        let mut job = Job::new("a", "email", json!({}), 3);
        job.record_failure("smtp down");

        let row = job_row(&job);
        assert!(row.starts_with('a'));
        assert!(row.contains("1/3"));
        assert!(row.ends_with("smtp down"));
    }
}
