use super::{DBClient, UserExt};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

impl DBClient {
    /// Schedule the purge of signups whose confirmation code expired unused.
    /// `schedule` is a six-field cron expression (seconds first).
    pub async fn start_cleanup_task(&self, schedule: &str) -> Result<JobScheduler, JobSchedulerError> {
        let sched = JobScheduler::new().await?;
        let db_client = self.clone();

        let job = Job::new_async(schedule, move |uuid, _l| {
            let db_client = db_client.clone();
            Box::pin(async move {
                tracing::info!("Running cleanup job {:?}", uuid);

                match db_client.purge_stale_signups().await {
                    Ok(deleted) => {
                        tracing::info!(
                            "Cleanup job {:?} finished successfully, deleted {} users",
                            uuid,
                            deleted
                        );
                    }
                    Err(e) => {
                        tracing::error!("Cleanup job {:?} failed: {:?}", uuid, e);
                    }
                }
            })
        })?;

        sched.add(job).await?;
        //It doesn't block.
        sched.start().await?;

        Ok(sched)
    }
}
