/// Poem store
///
/// Writes one `NormalizedPoem` into `t_poem` through a prepared,
/// parameterized INSERT. The pool is injected by the caller; the store never
/// opens connections of its own.
///
/// # Statement
///
/// ```sql
/// INSERT INTO t_poem (title, dynasty, author, content, `all`, `translate`, tag)
/// VALUES (?, ?, ?, ?, ?, ?, ?)
/// ```
///
/// Identifiers are quoted per dialect (`all` and `translate` are reserved
/// words) and PostgreSQL receives `$1..$7` placeholders instead of `?`.
///
/// No transaction wraps the insert; a single statement is atomic on its own.

use async_trait::async_trait;
use poemcron_shared::db::Dialect;
use poemcron_shared::models::poem::NormalizedPoem;
use sqlx::AnyPool;
use sqlx::{Executor, Statement};
use thiserror::Error;

/// Target table
pub const POEM_TABLE: &str = "t_poem";

/// Insert columns, in bind order
pub const POEM_COLUMNS: [&str; 7] = [
    "title",
    "dynasty",
    "author",
    "content",
    "all",
    "translate",
    "tag",
];

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No connection could be acquired or the statement failed to prepare
    #[error("Failed to prepare insert statement: {0}")]
    Prepare(#[source] sqlx::Error),

    /// The prepared statement failed to execute
    #[error("Failed to execute insert statement: {0}")]
    Exec(#[source] sqlx::Error),
}

/// Sink for normalized poems
#[async_trait]
pub trait PoemSink: Send + Sync {
    /// Persists one poem
    async fn store(&self, poem: &NormalizedPoem) -> Result<(), StoreError>;
}

/// Builds the insert statement for `dialect`
pub fn insert_sql(dialect: Dialect) -> String {
    let columns = POEM_COLUMNS
        .iter()
        .map(|column| dialect.quote(column))
        .collect::<Vec<_>>()
        .join(", ");

    let placeholders = (1..=POEM_COLUMNS.len())
        .map(|index| dialect.placeholder(index))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        POEM_TABLE, columns, placeholders
    )
}

/// SQL-backed poem store
#[derive(Clone)]
pub struct PoemStore {
    /// Database connection pool
    db: AnyPool,

    /// Insert statement for the configured dialect
    sql: String,
}

impl PoemStore {
    /// Creates a new poem store
    ///
    /// # Arguments
    ///
    /// * `db` - Connection pool opened at startup
    /// * `dialect` - Dialect of the pool's driver
    pub fn new(db: AnyPool, dialect: Dialect) -> Self {
        PoemStore {
            db,
            sql: insert_sql(dialect),
        }
    }

    /// Returns the insert statement in use
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl PoemSink for PoemStore {
    async fn store(&self, poem: &NormalizedPoem) -> Result<(), StoreError> {
        let mut conn = self.db.acquire().await.map_err(StoreError::Prepare)?;

        let statement = (&mut *conn)
            .prepare(self.sql.as_str())
            .await
            .map_err(StoreError::Prepare)?;

        let mut query = statement.query();
        for value in poem.columns() {
            query = query.bind(value.to_string());
        }

        let result = query.execute(&mut *conn).await.map_err(StoreError::Exec)?;

        tracing::info!(
            title = %poem.title,
            author = %poem.author,
            rows_affected = result.rows_affected(),
            "Poem stored"
        );

        Ok(())
    }
}
