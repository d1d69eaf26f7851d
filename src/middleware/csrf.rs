//! # CSRF Guard
//!
//! Each session holds one random secret. Every rendered page gets a fresh
//! token derived from that secret and a random salt:
//!
//! ```text
//! token = salt "-" base64url(sha256(salt "-" secret))
//! ```
//!
//! A state-changing request must echo a token that hashes back to the
//! session's secret. Tokens are not single-use; any token minted for the
//! session stays valid for as long as the secret does.

use crate::error::AppResult;
use crate::session::keys;
use axum::http::{HeaderMap, Method};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use constant_time_eq::constant_time_eq;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tower_sessions::Session;

/// Form and query field carrying the token.
pub const FIELD_NAME: &str = "_csrf";

/// Headers checked, in order, when no form field is present.
const HEADER_NAMES: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];

const SECRET_BYTES: usize = 18;
const SALT_LEN: usize = 8;

/// GET, HEAD, OPTIONS and TRACE never need a token.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn create_token(secret: &str) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    token_for(&salt, secret)
}

fn token_for(salt: &str, secret: &str) -> String {
    let digest = Sha256::digest(format!("{salt}-{secret}").as_bytes());
    format!("{salt}-{}", URL_SAFE_NO_PAD.encode(digest))
}

pub fn verify_token(secret: &str, token: &str) -> bool {
    let Some((salt, _)) = token.split_once('-') else {
        return false;
    };
    if salt.is_empty() {
        return false;
    }

    constant_time_eq(token_for(salt, secret).as_bytes(), token.as_bytes())
}

/// Find the token a request carries: body field, then query, then headers.
pub fn extract_token(
    form: &HashMap<String, String>,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Option<String> {
    if let Some(token) = form.get(FIELD_NAME).or_else(|| query.get(FIELD_NAME)) {
        return Some(token.clone());
    }

    HEADER_NAMES.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    })
}

/// Read the session's secret, creating it on first use.
///
/// Creating the secret modifies the session, which is what makes a
/// first-time visitor receive a session cookie.
pub async fn ensure_secret(session: &Session) -> AppResult<String> {
    if let Some(secret) = session.get::<String>(keys::CSRF_SECRET).await? {
        return Ok(secret);
    }

    let secret = generate_secret();
    session.insert(keys::CSRF_SECRET, &secret).await?;
    Ok(secret)
}
