//! # Middleware Module
//!
//! Everything that runs between the session layer and the route handlers.
//!
//! - `context`: the ordered pipeline building the per-request context
//! - `user`: resolves the logged-in user from the session
//! - `csrf`: token issuing and validation
//! - `flash`: one-shot messages across redirects
//! - `upload`: form body buffering and the `avatar` upload
//! - `auth`: redirects anonymous visitors away from protected pages
//! - `security`: security response headers

pub mod auth;
pub mod context;
pub mod csrf;
pub mod flash;
pub mod security;
pub mod upload;
pub mod user;
