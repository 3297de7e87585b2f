/// Configuration management for the poem worker
///
/// Configuration is read once at startup from a JSON document and is
/// immutable afterwards. Any key can be overridden from the environment,
/// so secrets never need to live in the file.
///
/// # File Format
///
/// ```json
/// {
///   "token": "jinrishici-user-token",
///   "time": "0 0 */2 * * *",
///   "DB": {
///     "ip_addr": "127.0.0.1",
///     "port": "3306",
///     "driver": "mysql",
///     "user": "poem",
///     "pass": "secret",
///     "name": "poem"
///   }
/// }
/// ```
///
/// # Environment Variables
///
/// - `POEM_CONFIG_PATH`: Path of the JSON file (default: config/config.json)
/// - `POEM_<KEY>`: Overrides a top-level key, e.g. `POEM_TOKEN`, `POEM_TIME`
/// - `POEM_<SECTION>__<KEY>`: Overrides a nested key, e.g. `POEM_DB__PASS`,
///   `POEM_DB__MAX_CONNECTIONS`, `POEM_HTTP__TIMEOUT_SECONDS`
///
/// Empty variables are ignored.
///
/// # Example
///
/// ```no_run
/// use poemcron_shared::config::PoemConfig;
///
/// # fn example() -> Result<(), poemcron_shared::config::ConfigError> {
/// let config = PoemConfig::from_env()?;
/// println!("Schedule: {}", config.time);
/// # Ok(())
/// # }
/// ```

use config::Source;
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::Validate;

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "POEM_CONFIG_PATH";

/// Config file used when `POEM_CONFIG_PATH` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "POEM";

/// Separator between nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Default poem-of-the-day endpoint
pub const DEFAULT_ENDPOINT: &str = "https://v2.jinrishici.com/sentence";

/// Configuration errors
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file is missing
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Config file could not be read or parsed
    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    /// Config parsed but failed validation
    #[error("Invalid config: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Complete worker configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PoemConfig {
    /// Access token sent as `X-User-Token`
    #[validate(length(min = 1, message = "token must not be empty"))]
    pub token: String,

    /// Cron expression driving the fetch schedule
    #[validate(length(min = 1, message = "time must not be empty"))]
    pub time: String,

    /// Database connection parameters
    #[serde(rename = "DB", alias = "db")]
    #[validate(nested)]
    pub db: DbConfig,

    /// HTTP client settings
    #[serde(default)]
    #[validate(nested)]
    pub http: HttpConfig,
}

/// Database connection parameters
#[derive(Clone, Deserialize, Validate)]
pub struct DbConfig {
    /// Database host
    #[validate(length(min = 1, message = "ip_addr must not be empty"))]
    pub ip_addr: String,

    /// Database port, accepted as string or number
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,

    /// Driver name: mysql, postgres or sqlite
    #[validate(length(min = 1, message = "driver must not be empty"))]
    pub driver: String,

    /// Database user
    #[serde(default)]
    pub user: String,

    /// Database password
    #[serde(default)]
    pub pass: String,

    /// Database name (file path for sqlite)
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    /// Maximum connections in the pool
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, message = "max_connections must be at least 1"))]
    pub max_connections: u32,

    /// Timeout for opening or acquiring a connection (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

// Keep the password out of logs.
impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("ip_addr", &self.ip_addr)
            .field("port", &self.port)
            .field("driver", &self.driver)
            .field("user", &self.user)
            .field("pass", &"***")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .finish()
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HttpConfig {
    /// Poem endpoint
    #[serde(default = "default_endpoint")]
    #[validate(length(min = 1, message = "endpoint must not be empty"))]
    pub endpoint: String,

    /// Request timeout (seconds)
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: default_http_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(s) => s,
        Port::Number(n) => n.to_string(),
    })
}

impl PoemConfig {
    /// Loads configuration from the path in `POEM_CONFIG_PATH`
    ///
    /// Falls back to `config/config.json` when the variable is unset.
    /// A `.env` file is honoured if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, or fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::load(config_path())
    }

    /// Loads configuration from an explicit path
    ///
    /// `POEM_*` environment overrides still apply on top of the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    /// Loads configuration from `path` with overrides taken from `env`
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, or fails validation.
    pub fn load_with(
        path: impl AsRef<Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let source = path.to_string_lossy();
        let mut builder = config::Config::builder()
            .add_source(config::File::new(&source, config::FileFormat::Json));

        // Environment keys arrive lowercased; the file spells the section `DB`.
        for (key, value) in env.collect()? {
            let key = match key.strip_prefix("db.") {
                Some(rest) => format!("DB.{}", rest),
                None => key,
            };
            builder = builder.set_override(key, value)?;
        }

        let config: PoemConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            driver = %config.db.driver,
            schedule = %config.time,
            "Configuration loaded"
        );

        Ok(config)
    }
}

/// Environment source for `POEM_*` overrides
///
/// `POEM_TOKEN` maps to `token`, `POEM_DB__PASS` to `DB.pass`.
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR)
        .ignore_empty(true)
}

/// Resolves the config file path from the environment
pub fn config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
