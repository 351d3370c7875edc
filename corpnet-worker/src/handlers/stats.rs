//! Recounts the stats row of one event

use async_trait::async_trait;
use corpnet_shared::models::job::JobPayload;
use corpnet_shared::models::stats::EventStats;

use super::{HandlerError, JobContext, JobHandler};

pub struct StatsHandler;

#[async_trait]
impl JobHandler for StatsHandler {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn job_types(&self) -> &'static [&'static str] {
        &["update_event_stats"]
    }

    async fn handle(&self, ctx: &JobContext, payload: JobPayload) -> Result<(), HandlerError> {
        let (kind, event_id) = match payload {
            JobPayload::UpdateEventStats { kind, event_id } => (kind, event_id),
            other => return Err(HandlerError::unexpected(self.name(), &other)),
        };

        match EventStats::recompute(&ctx.db, kind, event_id).await? {
            Some(stats) => tracing::debug!(
                kind = %kind,
                event_id = %event_id,
                invitees = stats.invitees,
                rsvps = stats.rsvps,
                "Event stats recomputed"
            ),
            // Deleted between scheduling and now
            None => tracing::info!(kind = %kind, event_id = %event_id, "Event gone, stats skipped"),
        }

        Ok(())
    }
}
