//! # poemcron Worker Library
//!
//! This library provides the scheduled fetch-then-store pipeline: a cron
//! scheduler fires a job that fetches one poem over HTTP and inserts it into
//! the database.
//!
//! ## Modules
//!
//! - `fetcher`: Authenticated GET against the sentence endpoint
//! - `store`: Parameterized insert into `t_poem`
//! - `jobs`: The job trait and the fetch-then-store job
//! - `scheduler`: Cron-driven, cancellable job loop
//! - `logging`: Append-mode log file sink
//!
//! ## Example
//!
//! ```no_run
//! use poemcron_worker::jobs::{Job, PoemJob};
//!
//! # async fn example(job: PoemJob) {
//! println!("Job: {}", job.name());
//! # }
//! ```

pub mod fetcher;
pub mod jobs;
pub mod logging;
pub mod scheduler;
pub mod store;
