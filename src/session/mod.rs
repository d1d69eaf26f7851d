//! # Sessions
//!
//! Server-side session records behind one signed cookie.
//!
//! - `store`: the adapter persisting records in the document store
//! - this module: the session keys every component agrees on, the cookie
//!   signing key, the manager layer and the expired-session sweep

pub mod store;

use crate::config::Config;
use sha2::{Digest, Sha512};
use std::time::Duration;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer};

pub use store::DocumentSessionStore;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "shop.sid";

/// Keys inside the session record.
pub mod keys {
    /// Id of the logged-in user; absent for anonymous sessions
    pub const USER_ID: &str = "user_id";
    /// Per-session CSRF secret
    pub const CSRF_SECRET: &str = "csrf_secret";
    /// Pending flash messages, `{ key: [message, ..] }`
    pub const FLASH: &str = "flash";
}

/// Derive the 64-byte cookie signing key from the configured secret.
///
/// `Key::from` requires exactly 64 bytes of key material; SHA-512 turns a
/// secret of any length into that.
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

pub fn layer(
    store: DocumentSessionStore,
    config: &Config,
) -> SessionManagerLayer<DocumentSessionStore, SignedCookie> {
    SessionManagerLayer::new(store)
        .with_name(COOKIE_NAME)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_secure(config.cookie_secure)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(
            config.session_ttl_hours,
        )))
        .with_signed(cookie_key(&config.session_secret))
}

/// Periodically delete expired session documents.
///
/// A failed sweep is logged and retried on the next tick.
pub fn spawn_cleanup(store: DocumentSessionStore, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            tracing::debug!("Running expired session cleanup");
            if let Err(e) = store.delete_expired().await {
                tracing::error!("Session cleanup failed: {:?}", e);
            }
        }
    });
}
