//! # Authentication Context Loader
//!
//! Resolves the user whose id the session carries. The result is an explicit
//! [`IdentityOutcome`]; deciding what a failure means is left to the caller,
//! and the context composer treats it as anonymous.

use crate::db::models::User;
use crate::db::{store::DocumentStore, users};
use crate::session::keys;
use tower_sessions::Session;

#[derive(Debug)]
pub enum IdentityOutcome {
    /// The session carries no user id
    Anonymous,
    Resolved(User),
    /// Reading the session or the user failed, or the id points nowhere
    Failed(String),
}

pub async fn resolve_identity(store: &dyn DocumentStore, session: &Session) -> IdentityOutcome {
    let user_id = match session.get::<String>(keys::USER_ID).await {
        Ok(Some(id)) => id,
        Ok(None) => return IdentityOutcome::Anonymous,
        Err(e) => return IdentityOutcome::Failed(format!("session read failed: {e}")),
    };

    match users::find_by_id(store, &user_id).await {
        Ok(user) => IdentityOutcome::Resolved(user),
        Err(e) => IdentityOutcome::Failed(format!("user lookup failed for {user_id}: {e}")),
    }
}
