//! `tower_sessions::SessionStore` over the document store.
//!
//! One document per session in the `sessions` collection, keyed by the
//! session id's string form. The id itself is an `i128`, which a JSON number
//! cannot carry, so it only ever appears as the document key:
//!
//! ```json
//! { "data": { "csrf_secret": "...", "user_id": "..." }, "expires_at": 1767225600 }
//! ```
//!
//! The expiry is also mirrored into the store's `expires_at` column so
//! expired documents can be swept without decoding them.

use crate::db::store::{collections::SESSIONS, DocumentStore};
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;
use tower_sessions::{ExpiredDeletion, SessionStore};

#[derive(Clone)]
pub struct DocumentSessionStore {
    store: Arc<dyn DocumentStore>,
}

impl DocumentSessionStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for DocumentSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSessionStore")
            .field("collection", &SESSIONS)
            .finish()
    }
}

/// What is persisted for one session. Whole seconds are enough for expiry.
#[derive(Debug, Serialize, Deserialize)]
struct SessionDocument {
    data: HashMap<String, Value>,
    expires_at: i64,
}

impl SessionDocument {
    fn from_record(record: &Record) -> Self {
        Self {
            data: record.data.clone(),
            expires_at: record.expiry_date.unix_timestamp(),
        }
    }

    fn into_record(self, id: Id) -> session_store::Result<Record> {
        let expiry_date = OffsetDateTime::from_unix_timestamp(self.expires_at)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;

        Ok(Record {
            id,
            data: self.data,
            expiry_date,
        })
    }
}

fn backend(err: AppError) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

#[async_trait]
impl SessionStore for DocumentSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // Ids are random i128s; a collision is unlikely but must not
        // overwrite someone else's session.
        while self
            .store
            .find_by_id(SESSIONS, &record.id.to_string())
            .await
            .map_err(backend)?
            .is_some()
        {
            record.id = Id::default();
        }

        self.save(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let document = SessionDocument::from_record(record);
        let body = serde_json::to_value(&document)
            .map_err(|e| session_store::Error::Encode(e.to_string()))?;

        self.store
            .save(
                SESSIONS,
                &record.id.to_string(),
                &body,
                Some(document.expires_at),
            )
            .await
            .map_err(backend)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let Some(doc) = self
            .store
            .find_by_id(SESSIONS, &session_id.to_string())
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let document: SessionDocument = serde_json::from_value(doc)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;
        let record = document.into_record(*session_id)?;

        // The sweep runs periodically; anything past its expiry in between
        // is already gone as far as callers are concerned.
        if record.expiry_date <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.store
            .delete(SESSIONS, &session_id.to_string())
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

#[async_trait]
impl ExpiredDeletion for DocumentSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let removed = self
            .store
            .delete_expired(SESSIONS, OffsetDateTime::now_utc().unix_timestamp())
            .await
            .map_err(backend)?;

        if removed > 0 {
            tracing::debug!(removed, "deleted expired sessions");
        }
        Ok(())
    }
}
