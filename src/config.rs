use crate::core::{DbError, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Driver options applied under every configured or per-call option.
static DEFAULT_OPTIONS: Lazy<Map<String, Value>> = Lazy::new(|| {
    let mut options = Map::new();
    options.insert("CharacterSet".to_string(), Value::from("UTF-8"));
    options.insert("ReturnDatesAsStrings".to_string(), Value::Bool(true));
    options
});

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub connection: DbConfig,
    pub debug: Option<DebugConfig>,
}

/// Connection settings. All four identity fields are required.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Initial debug settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DebugConfig {
    pub enabled: Option<bool>,
    pub calls: Option<i64>,
    pub and_then: Option<i64>,
}

impl DbConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let config = DbConfig {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            options: Map::new(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Fails with `Undefined <field>` for the first empty required field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("host", &self.host),
            ("database", &self.database),
            ("user", &self.user),
            ("password", &self.password),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(DbError::Config(format!("Undefined {}", name))),
            None => Ok(()),
        }
    }

    /// Merges defaults, configured options and `overrides`, later layers winning.
    pub fn driver_options(&self, overrides: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = DEFAULT_OPTIONS.clone();
        for (key, value) in self.options.iter().chain(overrides.iter()) {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = dbexec::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config.connection.host);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(content)?;
    config.connection.validate()?;
    Ok(config)
}

/// `<config_dir>/dbexec/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dbexec").join("config.toml"))
}
