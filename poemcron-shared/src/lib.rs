//! # poemcron Shared Library
//!
//! This crate contains the configuration, database connector and poem models
//! used by the poemcron worker.
//!
//! ## Module Organization
//!
//! - `config`: JSON configuration file loading and validation
//! - `db`: Driver-specific connection pool with a startup ping
//! - `models`: Sentence endpoint payload and the normalized poem row

pub mod config;
pub mod db;
pub mod models;

/// Current version of the poemcron shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
