//! # Application State
//!
//! Resources shared by every handler and middleware. Axum clones the state
//! for each request, which is cheap because everything inside is an `Arc`.
//!
//! The state is constructed once at bootstrap and injected; nothing in the
//! application reaches for a global connection.

use crate::config::Config;
use crate::db::store::{DocumentStore, SqliteDocumentStore};
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// The document store connection, shared by all requests without locking
    pub store: Arc<dyn DocumentStore>,

    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to the document store and verify it answers.
    ///
    /// # Errors
    /// Returns an error if the connection, the migrations or the ping fail.
    /// Bootstrap must not start listening in that case.
    pub async fn new(config: &Config) -> Result<Self> {
        let store = SqliteDocumentStore::connect(&config.database_url)
            .await
            .context("failed to connect to the document store")?;
        store
            .ping()
            .await
            .context("document store did not answer the ping")?;

        Ok(Self::with_store(Arc::new(store), config.clone()))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
