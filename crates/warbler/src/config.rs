//! Layered configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML config
//! file, `WARBLER__SECTION__KEY` environment variables, and finally
//! `DATABASE_URL`. Configuration is resolved before any database is opened.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::auth::PasswordHasher;

pub const APP_NAME: &str = "warbler";

/// Environment variable naming the database, honoured over all other sources.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full sqlx URL, e.g. `sqlite://warbler.db?mode=rwc`.
    pub url: Option<String>,
    /// Database file path; `~` and variables are expanded. Ignored when
    /// `url` is set.
    pub path: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            max_connections: 5,
        }
    }
}

/// Where the database lives once configuration is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Url(String),
    Path(PathBuf),
}

impl DatabaseConfig {
    /// Resolve `url`, then `path`, then `<data_dir>/warbler.db`.
    pub fn target(&self, data_dir: &Path) -> Result<DatabaseTarget> {
        if let Some(url) = self.url.as_deref().filter(|url| !url.trim().is_empty()) {
            return Ok(DatabaseTarget::Url(url.trim().to_string()));
        }

        match self.path.as_deref() {
            Some(path) => Ok(DatabaseTarget::Path(expand_path(path)?)),
            None => Ok(DatabaseTarget::Path(data_dir.join(format!("{APP_NAME}.db")))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: PasswordHasher::default().cost(),
        }
    }
}

impl AuthConfig {
    pub fn hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.bcrypt_cost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON log lines instead of the human format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Resolved filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(&path.to_string_lossy())?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => BaseDir::Config.resolve()?.join("config.toml"),
        };

        Ok(Self {
            config_file,
            data_dir: BaseDir::Data.resolve()?,
        })
    }
}

/// Load configuration from `config_file` and the process environment.
pub fn load_config(config_file: &Path) -> Result<AppConfig> {
    load_config_from(config_file, None, env::var(DATABASE_URL_ENV).ok())
}

/// Load configuration with an explicit environment.
///
/// `env_source` replaces the process environment for `WARBLER__*` keys when
/// given; `database_url` stands in for `DATABASE_URL`.
pub fn load_config_from(
    config_file: &Path,
    env_source: Option<HashMap<String, String>>,
    database_url: Option<String>,
) -> Result<AppConfig> {
    let built = Config::builder()
        .set_default("logging.level", "info")?
        .set_default("database.max_connections", 5_i64)?
        .add_source(
            File::from(config_file)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(
            Environment::with_prefix(&env_prefix())
                .separator("__")
                .try_parsing(true)
                .source(env_source),
        )
        .build()
        .with_context(|| format!("loading config from {}", config_file.display()))?;

    let mut config: AppConfig = built
        .try_deserialize()
        .context("deserializing configuration")?;

    if let Some(url) = database_url.filter(|url| !url.trim().is_empty()) {
        config.database.url = Some(url);
    }

    Ok(config)
}

/// Write the default configuration, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let toml = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    fs::write(path, toml).with_context(|| format!("writing config file {}", path.display()))?;

    Ok(())
}

fn expand_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).with_context(|| format!("expanding path {text}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Per-user base directory, resolved as `$XDG_*_HOME`, then the platform
/// default, then a path under the home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseDir {
    Config,
    Data,
}

impl BaseDir {
    fn resolve(self) -> Result<PathBuf> {
        let xdg_var = match self {
            BaseDir::Config => "XDG_CONFIG_HOME",
            BaseDir::Data => "XDG_DATA_HOME",
        };
        self.resolve_from(env::var_os(xdg_var))
    }

    fn resolve_from(self, xdg_home: Option<OsString>) -> Result<PathBuf> {
        let (platform, under_home): (Option<PathBuf>, &[&str]) = match self {
            BaseDir::Config => (dirs::config_dir(), &[".config"][..]),
            BaseDir::Data => (dirs::data_dir(), &[".local", "share"][..]),
        };

        let base = xdg_home
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or(platform)
            .or_else(|| {
                dirs::home_dir().map(|home| under_home.iter().fold(home, |dir, part| dir.join(part)))
            })
            .ok_or_else(|| anyhow!("unable to determine {self:?} directory"))?;

        Ok(base.join(APP_NAME))
    }
}

fn env_prefix() -> String {
    APP_NAME.to_ascii_uppercase()
}
