use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;
const SPREADSHEET_ID_LEN: usize = 44;

/// Which store implementation backs the service
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sql,
    Sheets,
}

/// Spreadsheet backend configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SheetsConfig {
    /// Spreadsheet identifier; cleaned with [`clean_spreadsheet_id`] before use
    #[serde(default)]
    pub spreadsheet_id: String,

    /// Base URL of the values API
    #[serde(default = "default_sheets_api_base")]
    pub api_base_url: String,

    /// Static bearer token; takes precedence over service-account credentials
    #[serde(default)]
    pub access_token: Option<String>,

    /// Service-account key as inline JSON
    #[serde(default)]
    pub credentials_json: Option<String>,

    /// Service-account key file, used when no inline JSON is set
    #[serde(default)]
    pub credentials_file: Option<String>,

    /// Whole-sheet read cache lifetime in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1, max = 10))]
    pub max_retries: u32,

    /// Base wait after an HTTP 429, multiplied by the attempt number
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Base wait after a connection failure, multiplied by the attempt number
    #[serde(default = "default_connection_backoff_ms")]
    pub connection_backoff_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_base_url: default_sheets_api_base(),
            access_token: None,
            credentials_json: None,
            credentials_file: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            max_retries: default_max_retries(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            connection_backoff_ms: default_connection_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SheetsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cleaned_spreadsheet_id(&self) -> String {
        clean_spreadsheet_id(&self.spreadsheet_id)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// Selects the SQL or spreadsheet store
    #[serde(default)]
    pub storage_backend: StorageBackend,

    #[serde(default)]
    #[validate]
    pub sheets: SheetsConfig,

    /// Offset of the business' local clock from UTC, in minutes
    #[serde(default = "default_utc_offset_minutes")]
    #[validate(range(min = -720, max = 840))]
    pub utc_offset_minutes: i32,

    /// Share of sales reported as margin
    #[serde(default = "default_margin_rate")]
    #[validate(custom = "validate_margin_rate")]
    pub margin_rate: Decimal,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            storage_backend: StorageBackend::Sql,
            sheets: SheetsConfig::default(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            margin_rate: default_margin_rate(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// The business' local clock; falls back to UTC for an out-of-range offset.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.storage_backend == StorageBackend::Sheets {
            if self.sheets.spreadsheet_id.trim().is_empty() {
                let mut err = ValidationError::new("spreadsheet_id_required");
                err.message = Some(
                    "Set APP__SHEETS__SPREADSHEET_ID when storage_backend is \"sheets\"".into(),
                );
                errors.add("sheets", err);
            }
            let has_credentials = self.sheets.access_token.is_some()
                || self.sheets.credentials_json.is_some()
                || self.sheets.credentials_file.is_some();
            if !has_credentials {
                let mut err = ValidationError::new("sheets_credentials_required");
                err.message = Some(
                    "Provide sheets.access_token, sheets.credentials_json or sheets.credentials_file"
                        .into(),
                );
                errors.add("sheets", err);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true_bool() -> bool {
    true
}

fn default_sheets_api_base() -> String {
    DEFAULT_SHEETS_API_BASE.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit_backoff_ms() -> u64 {
    2000
}

fn default_connection_backoff_ms() -> u64 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

fn default_margin_rate() -> Decimal {
    Decimal::new(30, 2)
}

fn default_db_max_connections() -> u32 {
    5
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_margin_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if rate.is_sign_negative() || *rate > Decimal::ONE {
        let mut err = ValidationError::new("margin_rate");
        err.message = Some("margin_rate must be between 0 and 1".into());
        return Err(err);
    }
    Ok(())
}

/// Normalises a spreadsheet id pasted from a URL or an env file.
///
/// Ids are 44 characters of `[A-Za-z0-9_-]`. Longer values are cut back to
/// the first 44-character run (dropping stray suffixes such as `cls`), or to
/// their leading 40-44 valid characters.
pub fn clean_spreadsheet_id(raw: &str) -> String {
    let mut id = raw.trim().to_string();

    if id.len() > SPREADSHEET_ID_LEN {
        let exact = Regex::new(r"([A-Za-z0-9_-]{44})(?:cls|\.cls|\.|$)")
            .ok()
            .and_then(|re| re.captures(&id).map(|c| c[1].to_string()));
        let leading = || {
            Regex::new(r"^([A-Za-z0-9_-]{40,44})")
                .ok()
                .and_then(|re| re.captures(&id).map(|c| c[1].to_string()))
        };
        if let Some(cleaned) = exact.or_else(leading) {
            id = cleaned;
        }
    }

    if !id.is_empty() && id.len() != SPREADSHEET_ID_LEN {
        warn!(
            length = id.len(),
            "spreadsheet id is not {} characters long; verify the configured id",
            SPREADSHEET_ID_LEN
        );
    }

    id
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("bakery_ledger={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://bakery.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        backend = ?app_config.storage_backend,
        "Configuration loaded successfully"
    );
    Ok(app_config)
}
