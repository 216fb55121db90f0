//! `AppConfig` built from environment variables. Never stored globally: build one and thread it through `AppState`.

use crate::error::AppError;
use regex::Regex;
use std::net::SocketAddr;

pub const DEFAULT_SCHEMA_NAME: &str = "public";
pub const DEFAULT_SETTINGS_SCHEMA: &str = "pgdeck";
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 1000;
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    /// Namespace whose base tables are exposed.
    pub schema_name: String,
    /// When non-empty, only these tables are loaded.
    pub included_tables: Vec<String>,
    /// Schema holding the administrative `settings` table.
    pub settings_schema: String,
    /// Upper bound applied to client-supplied `limit`.
    pub max_page_limit: u32,
    pub listen_addr: SocketAddr,
    pub body_limit_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".into()))?;
        let schema_name = get("SCHEMA_NAME").unwrap_or_else(|| DEFAULT_SCHEMA_NAME.into());
        let included_tables = get("INCLUDED_TABLES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let settings_schema = get("SETTINGS_SCHEMA").unwrap_or_else(|| DEFAULT_SETTINGS_SCHEMA.into());
        if !is_plain_identifier(&settings_schema) {
            return Err(AppError::Validation(format!(
                "SETTINGS_SCHEMA must be a plain identifier, got {}",
                settings_schema
            )));
        }
        let max_page_limit = match get("MAX_PAGE_LIMIT") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AppError::Validation(format!("MAX_PAGE_LIMIT must be a positive integer, got {}", v)))?,
            None => DEFAULT_MAX_PAGE_LIMIT,
        };
        let listen_addr = get("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Validation(format!("LISTEN_ADDR: {}", e)))?;
        let body_limit_bytes = match get("BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| AppError::Validation(format!("BODY_LIMIT_BYTES must be an integer, got {}", v)))?,
            None => DEFAULT_BODY_LIMIT_BYTES,
        };

        Ok(AppConfig {
            database_url,
            schema_name,
            included_tables,
            settings_schema,
            max_page_limit,
            listen_addr,
            body_limit_bytes,
        })
    }

    /// Config with defaults for everything but the database url.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        AppConfig {
            database_url: database_url.into(),
            schema_name: DEFAULT_SCHEMA_NAME.into(),
            included_tables: Vec::new(),
            settings_schema: DEFAULT_SETTINGS_SCHEMA.into(),
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

fn is_plain_identifier(s: &str) -> bool {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}
