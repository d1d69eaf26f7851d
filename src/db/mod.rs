//! # Database Module
//!
//! - `store`: the [`DocumentStore`](store::DocumentStore) trait and its SQLite implementation
//! - `models`: documents kept in the store (User, Course, Order)
//! - `users`, `courses`, `orders`: typed operations over one collection each
//!
//! Sessions share the store but are handled by `crate::session`.

pub mod courses;
#[cfg(test)]
pub mod memory;
pub mod models;
pub mod orders;
pub mod store;
pub mod users;
