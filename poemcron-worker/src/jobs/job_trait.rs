/// Core Job trait
///
/// A job is the zero-argument unit of work the scheduler fires at every
/// trigger. Jobs report failure through their return value; the scheduler
/// logs it and carries on with the next trigger.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use poemcron_worker::jobs::Job;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Job for Heartbeat {
///     fn name(&self) -> &str {
///         "heartbeat"
///     }
///
///     async fn run(&self) -> anyhow::Result<()> {
///         tracing::info!("still alive");
///         Ok(())
///     }
/// }
/// ```

use async_trait::async_trait;

/// Core Job trait
#[async_trait]
pub trait Job: Send + Sync {
    /// Returns the job name
    ///
    /// Used for logging.
    fn name(&self) -> &str;

    /// Runs the job once
    ///
    /// # Returns
    ///
    /// Ok(()) if the run completed, Err with the cause otherwise
    async fn run(&self) -> anyhow::Result<()>;
}
