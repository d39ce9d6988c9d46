//! Run settings (TOML) and warehouse secrets (environment).
//!
//! Settings live in an optional `mptrack.toml`; every field has a default so
//! a missing file is fine. Secrets never go in the TOML file: they come from
//! `SQL_SERVER`, `SQL_DATABASE`, `SQL_USERNAME` and `SQL_PASSWORD`, loaded
//! from a git-ignored `.env` file when `SQL_SERVER` is not already set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File read when no `--config` is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "mptrack.toml";

/// Env file consulted when `SQL_SERVER` is not in the environment.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// SQL Server caps a statement at 2100 parameters; one is kept for the start date.
pub const MAX_TICKER_CHUNK: usize = 2000;

const DEFAULT_PORT: u16 = 1433;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("cannot load env file {path}: {message}")]
    EnvFile { path: PathBuf, message: String },

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("invalid SQL_SERVER value '{0}': expected host, host,port or host:port")]
    InvalidServer(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Run settings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    /// Wide allocation sheet (`.xlsx`, `.xls` or `.csv`).
    pub allocation: PathBuf,
    /// Ticker → analyst mapping; optional.
    pub analysts: PathBuf,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            allocation: PathBuf::from("ModelPort - demo allocation.xlsx"),
            analysts: PathBuf::from("Analyst in charge.xlsx"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub attribution_file: String,
    pub series_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("analysis"),
            attribution_file: "mp_model_daily_attribution.csv".to_string(),
            series_file: "mp_model_daily_series.csv".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn attribution_path(&self) -> PathBuf {
        self.dir.join(&self.attribution_file)
    }

    pub fn series_path(&self) -> PathBuf {
        self.dir.join(&self.series_file)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseSettings {
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub ticker_chunk_size: usize,
    pub benchmark_code: String,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            encrypt: true,
            trust_server_certificate: false,
            ticker_chunk_size: 200,
            benchmark_code: "VNINDEX".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/snapshot"),
        }
    }
}

/// Everything a run needs besides secrets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub inputs: InputsConfig,
    pub output: OutputConfig,
    pub warehouse: WarehouseSettings,
    pub cache: CacheConfig,
}

impl TrackerConfig {
    /// Load settings. An explicit path must exist; otherwise
    /// [`DEFAULT_CONFIG_FILE`] is read if present, else defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path, source },
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunk = self.warehouse.ticker_chunk_size;
        if chunk == 0 || chunk > MAX_TICKER_CHUNK {
            return Err(ConfigError::Invalid(format!(
                "warehouse.ticker_chunk_size must be between 1 and {MAX_TICKER_CHUNK}, got {chunk}"
            )));
        }
        if self.warehouse.benchmark_code.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "warehouse.benchmark_code must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// ── Secrets ──────────────────────────────────────────────────────────

/// Parsed `SQL_SERVER` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// Accepts `host`, `host,port`, `host:port`, each optionally prefixed `tcp:`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidServer(raw.to_string());
        let mut s = raw.trim();
        if let Some(prefix) = s.get(..4) {
            if prefix.eq_ignore_ascii_case("tcp:") {
                s = &s[4..];
            }
        }

        let (host, port) = match s.rsplit_once(',').or_else(|| s.rsplit_once(':')) {
            Some((host, port)) => (host.trim(), port.trim().parse::<u16>().map_err(|_| invalid())?),
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() || port == 0 {
            return Err(invalid());
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Connection secrets. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub server: ServerAddress,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Read secrets from the process environment, loading `env_file` first
    /// when `SQL_SERVER` is not set. A missing env file is not an error; the
    /// missing variable is reported instead.
    pub fn from_env(env_file: &Path) -> Result<Self, ConfigError> {
        if std::env::var_os("SQL_SERVER").is_none() {
            match dotenvy::from_path(env_file) {
                Ok(()) => tracing::debug!(path = %env_file.display(), "loaded env file"),
                Err(e) if e.not_found() => {
                    tracing::debug!(path = %env_file.display(), "no env file")
                }
                Err(e) => {
                    return Err(ConfigError::EnvFile {
                        path: env_file.to_path_buf(),
                        message: e.to_string(),
                    })
                }
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };
        Ok(Self {
            server: ServerAddress::parse(&get("SQL_SERVER")?)?,
            database: get("SQL_DATABASE")?,
            username: get("SQL_USERNAME")?,
            password: get("SQL_PASSWORD")?,
        })
    }
}
