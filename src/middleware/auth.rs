//! # Authentication Guard
//!
//! Route layer for pages that need a logged-in user. It does not look at the
//! session itself: the context composer has already resolved identity, and
//! a request whose lookup failed counts as anonymous here too.
//!
//! Anonymous visitors are redirected to the login page rather than given a
//! 401, since every protected route is a page a browser navigates to.

use crate::middleware::context::RequestContext;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

/// Where anonymous visitors of protected pages are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// A request without a context (the composer did not run) counts as
/// anonymous.
pub async fn require_auth(request: Request, next: Next) -> Response {
    let authenticated = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(|ctx| ctx.is_authenticated);

    if authenticated {
        next.run(request).await
    } else {
        Redirect::to(LOGIN_PATH).into_response()
    }
}
