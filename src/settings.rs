use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

/// Overrides the input file location.
pub const SALES_CSV_ENV: &str = "SALES_CSV";
/// Prefix for per-connection database overrides, e.g. `SALES_ETL_CONN_SALES_DB`.
pub const CONN_ENV_PREFIX: &str = "SALES_ETL_CONN_";

pub const DEFAULT_CSV_PATH: &str = "include/vendas.csv";
pub const DEFAULT_CONN_ID: &str = "sales_db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
    #[serde(default = "default_conn_id")]
    pub conn_id: String,
    /// Connection id -> SQLite database path.
    #[serde(default)]
    pub connections: BTreeMap<String, String>,
}

fn default_csv_path() -> String {
    DEFAULT_CSV_PATH.to_string()
}

fn default_conn_id() -> String {
    DEFAULT_CONN_ID.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            conn_id: default_conn_id(),
            connections: BTreeMap::new(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sales-etl")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sales-etl")
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings() -> Settings {
    read_settings(&settings_path()).unwrap_or_default()
}

pub fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| EtlError::Settings(format!("{}: {e}", path.display())))
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub csv_path: PathBuf,
    pub conn_id: String,
    pub database: PathBuf,
}

impl RunConfig {
    pub fn resolve(
        settings: &Settings,
        csv_flag: Option<PathBuf>,
        conn_flag: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let csv_path = csv_flag.unwrap_or_else(|| resolve_csv_path(settings, &env));
        let conn_id = conn_flag.unwrap_or_else(|| settings.conn_id.clone());
        let database = resolve_connection(settings, &conn_id, &env);
        Self {
            csv_path,
            conn_id,
            database,
        }
    }

    pub fn from_env(settings: &Settings, csv_flag: Option<PathBuf>, conn_flag: Option<String>) -> Self {
        Self::resolve(settings, csv_flag, conn_flag, |key| std::env::var(key).ok())
    }
}

/// `SALES_CSV` wins over the configured default; an empty value counts as unset.
pub fn resolve_csv_path(settings: &Settings, env: impl Fn(&str) -> Option<String>) -> PathBuf {
    match env(SALES_CSV_ENV).filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(&settings.csv_path),
    }
}

pub fn conn_env_key(conn_id: &str) -> String {
    format!("{CONN_ENV_PREFIX}{}", conn_id.to_uppercase().replace('-', "_"))
}

pub fn resolve_connection(
    settings: &Settings,
    conn_id: &str,
    env: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    if let Some(path) = env(&conn_env_key(conn_id)).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(path) = settings.connections.get(conn_id) {
        return PathBuf::from(path);
    }
    data_dir().join(format!("{conn_id}.db"))
}
