//! # Flash Messages
//!
//! One-shot messages carried across a redirect. A handler calls
//! [`Flash::set`] before redirecting; the context composer drains every
//! pending message at the start of the next request, so each message is seen
//! by at most one later request.

use crate::error::AppResult;
use crate::session::keys;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use std::collections::BTreeMap;
use tower_sessions::Session;

/// Pending or drained messages, grouped by key.
pub type FlashMessages = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct Flash {
    session: Session,
}

impl Flash {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn set(&self, key: &str, message: impl Into<String>) -> AppResult<()> {
        let mut pending = self.pending().await?;
        pending
            .entry(key.to_string())
            .or_default()
            .push(message.into());
        self.session.insert(keys::FLASH, &pending).await?;
        Ok(())
    }

    /// Read and remove every message under `key`.
    pub async fn drain(&self, key: &str) -> AppResult<Vec<String>> {
        let mut pending = self.pending().await?;
        let Some(messages) = pending.remove(key) else {
            return Ok(Vec::new());
        };

        if pending.is_empty() {
            self.session.remove_value(keys::FLASH).await?;
        } else {
            self.session.insert(keys::FLASH, &pending).await?;
        }
        Ok(messages)
    }

    /// Read and remove everything. Leaves the session untouched when nothing
    /// is pending, so anonymous page views don't rewrite the session record.
    pub async fn drain_all(&self) -> AppResult<FlashMessages> {
        let pending = self.pending().await?;
        if !pending.is_empty() {
            self.session.remove_value(keys::FLASH).await?;
        }
        Ok(pending)
    }

    async fn pending(&self) -> AppResult<FlashMessages> {
        Ok(self
            .session
            .get::<FlashMessages>(keys::FLASH)
            .await?
            .unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        Ok(Flash::new(session))
    }
}
