use std::path::PathBuf;

use axum::http::HeaderValue;
use thiserror::Error;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_WS_ADDR: &str = "0.0.0.0:9001";
pub const DEFAULT_CLIENT_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("{0} is not a valid origin header value")]
    InvalidOrigin(&'static str),
    #[error("{0} is not a valid byte count")]
    InvalidSize(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_addr: String,
    pub ws_addr: String,
    /// Exact CORS origin allowed for the browser client.
    pub client_origin: String,
    pub upload_dir: PathBuf,
    /// Prefix for the URLs handed out for uploaded files.
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Read configuration from the environment. The database URL is the one
    /// required setting: the process must not come up without a persistence
    /// layer behind it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("PATTER_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("PATTER_DATABASE_URL"))?;

        let client_origin = std::env::var("PATTER_CLIENT_ORIGIN")
            .unwrap_or_else(|_| DEFAULT_CLIENT_ORIGIN.to_string());
        client_origin
            .parse::<HeaderValue>()
            .map_err(|_| ConfigError::InvalidOrigin("PATTER_CLIENT_ORIGIN"))?;

        let max_upload_bytes = match std::env::var("PATTER_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidSize("PATTER_MAX_UPLOAD_BYTES"))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url,
            http_addr: std::env::var("PATTER_HTTP_ADDR")
                .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string()),
            ws_addr: std::env::var("PATTER_WS_ADDR")
                .unwrap_or_else(|_| DEFAULT_WS_ADDR.to_string()),
            client_origin,
            upload_dir: std::env::var("PATTER_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            public_base_url: std::env::var("PATTER_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string()),
            max_upload_bytes,
        })
    }
}
