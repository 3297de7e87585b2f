/// Database layer for poemcron
///
/// This module provides the connector: driver-specific URL construction,
/// pool creation and the startup ping. Poem models live in the `models`
/// module at crate root level; the insert itself lives in the worker.
///
/// # Example
///
/// ```no_run
/// use poemcron_shared::config::PoemConfig;
/// use poemcron_shared::db::pool::connect;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = PoemConfig::from_env()?;
///     let pool = connect(&config.db).await?;
///     Ok(())
/// }
/// ```

pub mod pool;

pub use pool::{connect, ConnectError, Dialect};
