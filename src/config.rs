//! # Configuration Management
//!
//! Configuration comes from the environment, read once at startup.
//! A `.env` file in the working directory is honoured for local development.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 5000)
//! - `DATABASE_URL`: Document store connection string
//! - `SESSION_SECRET`: Secret the session cookie signing key is derived from
//! - `SESSION_TTL_HOURS`: Inactivity window before a session expires (default: 24)
//! - `SESSION_CLEANUP_SECS`: Interval of the expired-session sweep (default: 600)
//! - `STATIC_DIR`: Directory served verbatim as the fallback (default: public)
//! - `UPLOAD_DIR`: Directory for uploaded avatars, served under `/images` (default: images)
//! - `MAX_BODY_BYTES`: Largest form body the context composer buffers (default: 5 MiB)
//! - `COOKIE_SECURE`: Mark the session cookie `Secure` (default: false)

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Used only when `SESSION_SECRET` is unset. Never deploy with it.
const DEV_SESSION_SECRET: &str = "course-shop-development-secret";

/// Application configuration
///
/// All fields are public so the bootstrap code and the middleware can read
/// them directly. The struct is cloned into `AppState` behind an `Arc`.
#[derive(Clone)]
pub struct Config {
    /// Server host/IP address to bind to
    pub host: String,

    /// Server port number
    pub port: u16,

    /// Document store URL
    /// Format: "sqlite:filename.db?mode=rwc" (read, write, create if missing)
    pub database_url: String,

    /// Raw session secret. The cookie key is derived from it, see
    /// `session::cookie_key`.
    pub session_secret: String,

    /// Hours of inactivity after which a session record expires
    pub session_ttl_hours: i64,

    /// Seconds between expired-session sweeps
    pub session_cleanup_secs: u64,

    /// Root of general static assets
    pub static_dir: PathBuf,

    /// Where accepted avatar uploads are written
    pub upload_dir: PathBuf,

    /// Upper bound for buffered url-encoded and multipart bodies
    pub max_body_bytes: usize,

    /// Whether the session cookie carries the `Secure` attribute
    pub cookie_secure: bool,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Every value has a default; only values that are present but fail to
    /// parse produce an error.
    pub fn from_env() -> Result<Self> {
        // dotenvy doesn't error if the file is missing
        dotenvy::dotenv().ok();

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("SESSION_SECRET is not set, using the development secret");
                DEV_SESSION_SECRET.to_string()
            }
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 5000)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:shop.db?mode=rwc".to_string()),
            session_secret,
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", 24)?,
            session_cleanup_secs: parse_var("SESSION_CLEANUP_SECS", 600)?,
            static_dir: env::var("STATIC_DIR")
                .unwrap_or_else(|_| "public".to_string())
                .into(),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "images".to_string())
                .into(),
            max_body_bytes: parse_var("MAX_BODY_BYTES", 5 * 1024 * 1024)?,
            cookie_secure: parse_var("COOKIE_SECURE", false)?,
        })
    }

    /// Combines host and port into the form `tokio::net::TcpListener::bind()` accepts.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Hand-written so the session secret never reaches the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("session_secret", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("session_cleanup_secs", &self.session_cleanup_secs)
            .field("static_dir", &self.static_dir)
            .field("upload_dir", &self.upload_dir)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for router tests; nothing here touches the network.
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            session_secret: DEV_SESSION_SECRET.to_string(),
            session_ttl_hours: 24,
            session_cleanup_secs: 600,
            static_dir: "public".into(),
            upload_dir,
            max_body_bytes: 1024 * 1024,
            cookie_secure: false,
        }
    }
}
