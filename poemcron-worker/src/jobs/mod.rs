/// Jobs fired by the scheduler
///
/// # Job Types
///
/// - **Poem**: fetch one poem from the sentence endpoint and store it
///
/// # Example
///
/// ```no_run
/// use poemcron_worker::fetcher::PoemFetcher;
/// use poemcron_worker::jobs::{Job, PoemJob};
/// use poemcron_worker::store::PoemStore;
/// use std::sync::Arc;
///
/// # async fn example(fetcher: PoemFetcher, store: PoemStore) -> anyhow::Result<()> {
/// let job = PoemJob::new(Arc::new(fetcher), Arc::new(store));
/// job.run().await?;
/// # Ok(())
/// # }
/// ```

pub mod job_trait;
pub mod poem;

// Re-export main types
pub use job_trait::Job;
pub use poem::{PipelineError, PoemJob};
