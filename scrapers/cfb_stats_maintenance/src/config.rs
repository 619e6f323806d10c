use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::env;

pub const ENV_FILE: &str = "dataconfig.env";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            database: String::new(),
            user: String::new(),
            password: None,
            port: 5432,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }

    /// Both tools are strictly sequential, so a single connection is enough.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(1)
            .connect_with(self.connect_options())
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.collegefootballdata.com".to_string(),
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (compatible; CfbStatsMaintenance/1.0)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
}

impl MaintenanceConfig {
    /// Loads `dataconfig.env` (falling back to `.env`) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::from_filename(ENV_FILE).ok();
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(host) = get("DB_HOST") {
            config.database.host = host;
        }
        config.database.database = get("DB_DATABASE").ok_or(ConfigError::Missing("DB_DATABASE"))?;
        config.database.user = get("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?;
        // Passwords are used verbatim, surrounding whitespace included.
        config.database.password = lookup("DB_PASSWORD").filter(|value| !value.is_empty());
        if let Some(port) = get("DB_PORT") {
            config.database.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "DB_PORT",
                value: port.clone(),
            })?;
        }

        config.api.api_key = get("CFB_API_KEY");
        if let Some(base_url) = get("CFB_API_BASE_URL") {
            config.api.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = get("CFB_API_TIMEOUT_SECS") {
            config.api.request_timeout_secs =
                timeout.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: "CFB_API_TIMEOUT_SECS",
                    value: timeout.clone(),
                })?;
        }

        Ok(config)
    }
}
