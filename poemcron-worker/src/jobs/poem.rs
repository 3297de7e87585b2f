/// Fetch-then-store job
///
/// One run fetches a poem and, only if that succeeded, stores it. Both
/// collaborators are injected so the job can run against the real endpoint
/// and database or against test doubles.
///
/// # Flow
///
/// ```text
/// PoemJob::run_once()
///   ├─> PoemSource::fetch()   (FetchError aborts the run)
///   └─> PoemSink::store()     (StoreError aborts the run)
/// ```

use crate::fetcher::{FetchError, PoemSource};
use crate::jobs::Job;
use crate::store::{PoemSink, StoreError};
use async_trait::async_trait;
use poemcron_shared::models::poem::NormalizedPoem;
use std::sync::Arc;
use thiserror::Error;

/// Errors of a single run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fetching failed; nothing was stored
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Storing failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fetch-then-store job
pub struct PoemJob {
    source: Arc<dyn PoemSource>,
    sink: Arc<dyn PoemSink>,
}

impl PoemJob {
    /// Creates a new poem job
    ///
    /// # Arguments
    ///
    /// * `source` - Where poems come from
    /// * `sink` - Where poems go
    pub fn new(source: Arc<dyn PoemSource>, sink: Arc<dyn PoemSink>) -> Self {
        PoemJob { source, sink }
    }

    /// Fetches one poem and stores it
    ///
    /// # Returns
    ///
    /// The poem that was stored
    ///
    /// # Errors
    ///
    /// `PipelineError::Fetch` if the fetch failed (the sink is never called),
    /// `PipelineError::Store` if the insert failed.
    pub async fn run_once(&self) -> Result<NormalizedPoem, PipelineError> {
        tracing::info!("Start get poem");

        let poem = self.source.fetch().await?;
        self.sink.store(&poem).await?;

        Ok(poem)
    }
}

#[async_trait]
impl Job for PoemJob {
    fn name(&self) -> &str {
        "poem"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.run_once().await?;
        Ok(())
    }
}
