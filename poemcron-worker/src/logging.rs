/// Log sink setup
///
/// All diagnostic output (status lines, errors, success markers) is
/// appended to a single log file.
///
/// # Environment Variables
///
/// - `POEM_LOG_PATH`: Log file (default: logger/poem.log)
/// - `POEM_LOG_FORMAT`: `json` for one JSON object per line (default: plain text)
/// - `RUST_LOG`: Log filter (default: poemcron_worker=info,poemcron_shared=info)

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log file path
pub const LOG_PATH_ENV: &str = "POEM_LOG_PATH";

/// Log file used when `POEM_LOG_PATH` is unset
pub const DEFAULT_LOG_PATH: &str = "logger/poem.log";

/// Environment variable selecting the line format
pub const LOG_FORMAT_ENV: &str = "POEM_LOG_FORMAT";

const DEFAULT_FILTER: &str = "poemcron_worker=info,poemcron_shared=info";

/// Resolves the log file path from the environment
pub fn log_path() -> PathBuf {
    env::var(LOG_PATH_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH))
}

/// Opens `path` for appending, creating it and its directory if needed
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global subscriber writing to the log file
///
/// # Returns
///
/// The path logs are written to
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn init_logging() -> anyhow::Result<PathBuf> {
    let path = log_path();
    let file = open_log_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", path.display(), e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file)),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .try_init()?;
    }

    Ok(path)
}
