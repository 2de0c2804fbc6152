//! Configuration management using the prefer crate.
//!
//! Resolution order (later wins): built-in defaults, config file
//! (`--config` or discovered by prefer), environment variables, CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::models::DEFAULT_TABLE;
use crate::repository::util::{is_postgres_url, redact_url_password};
use crate::repository::warehouse::WarehouseConfig;

/// Default SQLite database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "catalog.db";

/// Default HTML search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Default bind address for `serve`.
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Which catalog store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite or PostgreSQL, picked from the database URL.
    #[default]
    Relational,
    /// REST-session data warehouse.
    Warehouse,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "relational" | "sqlite" | "postgres" | "postgresql" => Some(Self::Relational),
            "warehouse" | "snowflake" => Some(Self::Warehouse),
            _ => None,
        }
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the default SQLite database.
    pub data_dir: PathBuf,
    /// Database URL (overrides data_dir/catalog.db if set).
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    /// Table used when a request does not name one.
    pub default_table: String,
    /// Bind address for the HTTP server.
    pub bind: String,
    /// HTML search endpoint queried by the retriever.
    pub search_url: String,
    /// User agent: "impersonate", a custom string, or None for the crate default.
    pub user_agent: Option<String>,
    /// Request timeout in seconds for search and page fetches.
    pub request_timeout: u64,
    /// Disable TLS for PostgreSQL connections.
    pub no_tls: bool,
    pub llm: LlmConfig,
    pub warehouse: WarehouseConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_url: None,
            store_backend: StoreBackend::default(),
            default_table: DEFAULT_TABLE.to_string(),
            bind: DEFAULT_BIND.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: Some("impersonate".to_string()),
            request_timeout: 30,
            no_tls: false,
            llm: LlmConfig::default(),
            warehouse: WarehouseConfig::default().with_env_overrides(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Check if using PostgreSQL (vs SQLite).
    pub fn is_postgres(&self) -> bool {
        self.database_url
            .as_ref()
            .is_some_and(|url| is_postgres_url(url))
    }

    /// Path of the default SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_DATABASE_FILENAME)
    }

    /// Create the data directory when the SQLite default is in use.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        if self.database_url.is_some() || self.store_backend == StoreBackend::Warehouse {
            return Ok(());
        }
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }

    /// One-line description of the configured store for startup logs.
    pub fn store_description(&self) -> String {
        match self.store_backend {
            StoreBackend::Warehouse => format!(
                "warehouse {}",
                self.warehouse
                    .base_url()
                    .unwrap_or_else(|| "(unconfigured)".to_string())
            ),
            StoreBackend::Relational => redact_url_password(&self.database_url()),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_backend: Option<StoreBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_tls: Option<bool>,
    /// LLM backend for generation and validation.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    /// Warehouse credentials (env vars override these).
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers catalog-enrich config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("catalog-enrich").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        config.llm = config.llm.with_env_overrides();
        config.warehouse = config.warehouse.with_env_overrides();
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref url) = self.database_url {
            settings.database_url = Some(url.clone());
        }
        if let Some(backend) = self.store_backend {
            settings.store_backend = backend;
        }
        if let Some(ref table) = self.default_table {
            settings.default_table = table.clone();
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if let Some(ref search_url) = self.search_url {
            settings.search_url = search_url.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(no_tls) = self.no_tls {
            settings.no_tls = no_tls;
        }
        settings.llm = self.llm.clone();
        settings.warehouse = self.warehouse.clone().with_env_overrides();
    }
}

/// Options for loading settings.
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    /// Explicit config file path (--config flag).
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Apply environment variable overrides that sit above the config file.
fn apply_env_overrides(settings: &mut Settings) {
    if let Some(database_url) = env_value("DATABASE_URL") {
        tracing::debug!(
            "Using DATABASE_URL from environment: {}",
            redact_url_password(&database_url)
        );
        settings.database_url = Some(database_url);
    }

    if let Some(val) = env_value("CATALOG_STORE_BACKEND") {
        match StoreBackend::from_str(&val) {
            Some(backend) => settings.store_backend = backend,
            None => tracing::warn!("Unknown CATALOG_STORE_BACKEND '{}', ignoring", val),
        }
    }

    if let Some(table) = env_value("CATALOG_DEFAULT_TABLE") {
        settings.default_table = table;
    }

    if let Some(search_url) = env_value("CATALOG_SEARCH_URL") {
        settings.search_url = search_url;
    }

    // CATALOG_NO_TLS disables TLS for PostgreSQL connections
    if env_flag("CATALOG_NO_TLS") {
        settings.no_tls = true;
    }
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", path.display(), e);
                Config::default()
            }
        },
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    apply_env_overrides(&mut settings);

    // --data-dir takes precedence over everything else
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }

    (settings, config)
}
