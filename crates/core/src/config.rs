use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Background sweep cadence. The generator sweep is designed for a daily
/// cycle and the expiry sweep for an hourly one; both are safe to run more
/// often because the jobs are re-entrant.
#[derive(Clone, Debug)]
pub struct JobsConfig {
    pub generator_interval_secs: u64,
    pub reaper_interval_secs: u64,
    pub run_on_start: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    /// Token gating the manual sweep endpoints. When unset, the admin
    /// endpoints accept unauthenticated requests.
    pub token: Option<SecretString>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub health_check_port: Option<u16>,
    pub generator_interval_secs: Option<u64>,
    pub reaper_interval_secs: Option<u64>,
    pub run_jobs_on_start: Option<bool>,
    pub admin_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

const DEFAULT_CONFIG_PATH: &str = "rebook.toml";
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    jobs: RawJobs,
    #[serde(default)]
    logging: RawLogging,
    #[serde(default)]
    admin: RawAdmin,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawJobs {
    generator_interval_secs: Option<u64>,
    reaper_interval_secs: Option<u64>,
    run_on_start: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAdmin {
    token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://rebook.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                health_check_port: 8081,
                graceful_shutdown_secs: 15,
            },
            jobs: JobsConfig {
                generator_interval_secs: 24 * 60 * 60,
                reaper_interval_secs: 60 * 60,
                run_on_start: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            admin: AdminConfig { token: None },
        }
    }
}

impl AppConfig {
    /// Layered load: built-in defaults, then the TOML file (if present),
    /// then `REBOOK_*` environment variables, then programmatic overrides.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = options
            .config_path
            .or_else(|| env::var("REBOOK_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let raw: RawConfig = toml::from_str(&contents)
                    .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
                config.apply_raw(raw);
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        }

        config.apply_env()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_raw(&mut self, raw: RawConfig) {
        if let Some(url) = raw.database.url {
            self.database.url = url;
        }
        if let Some(max_connections) = raw.database.max_connections {
            self.database.max_connections = max_connections;
        }
        if let Some(timeout_secs) = raw.database.timeout_secs {
            self.database.timeout_secs = timeout_secs;
        }
        if let Some(bind_address) = raw.server.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = raw.server.port {
            self.server.port = port;
        }
        if let Some(health_check_port) = raw.server.health_check_port {
            self.server.health_check_port = health_check_port;
        }
        if let Some(graceful_shutdown_secs) = raw.server.graceful_shutdown_secs {
            self.server.graceful_shutdown_secs = graceful_shutdown_secs;
        }
        if let Some(generator_interval_secs) = raw.jobs.generator_interval_secs {
            self.jobs.generator_interval_secs = generator_interval_secs;
        }
        if let Some(reaper_interval_secs) = raw.jobs.reaper_interval_secs {
            self.jobs.reaper_interval_secs = reaper_interval_secs;
        }
        if let Some(run_on_start) = raw.jobs.run_on_start {
            self.jobs.run_on_start = run_on_start;
        }
        if let Some(level) = raw.logging.level {
            self.logging.level = level;
        }
        if let Some(format) = raw.logging.format {
            self.logging.format = format;
        }
        if let Some(token) = raw.admin.token {
            self.admin.token = Some(token.into());
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("REBOOK_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("REBOOK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(value) = env::var("REBOOK_LOG_FORMAT") {
            self.logging.format = match value.as_str() {
                "compact" => LogFormat::Compact,
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidEnvOverride {
                        key: "REBOOK_LOG_FORMAT".to_string(),
                        value,
                    });
                }
            };
        }
        if let Ok(value) = env::var("REBOOK_PORT") {
            self.server.port = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "REBOOK_PORT".to_string(),
                value,
            })?;
        }
        if let Ok(value) = env::var("REBOOK_HEALTH_PORT") {
            self.server.health_check_port =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "REBOOK_HEALTH_PORT".to_string(),
                    value,
                })?;
        }
        if let Ok(token) = env::var("REBOOK_ADMIN_TOKEN") {
            self.admin.token = Some(token.into());
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
        if let Some(generator_interval_secs) = overrides.generator_interval_secs {
            self.jobs.generator_interval_secs = generator_interval_secs;
        }
        if let Some(reaper_interval_secs) = overrides.reaper_interval_secs {
            self.jobs.reaper_interval_secs = reaper_interval_secs;
        }
        if let Some(run_on_start) = overrides.run_jobs_on_start {
            self.jobs.run_on_start = run_on_start;
        }
        if let Some(admin_token) = overrides.admin_token {
            self.admin.token = Some(admin_token.into());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {VALID_LOG_LEVELS:?}, got `{}`",
                self.logging.level
            )));
        }
        if self.server.port == self.server.health_check_port {
            return Err(ConfigError::Validation(
                "server.port and server.health_check_port must differ".to_string(),
            ));
        }
        if self.jobs.generator_interval_secs == 0 || self.jobs.reaper_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "jobs intervals must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
