//! # HTTP Request Handlers
//!
//! One module per path prefix. Each module exposes `router()`, and `app`
//! nests it under its prefix:
//!
//! - `home`: `/`
//! - `add`: `/add`, create a course
//! - `courses`: `/courses`, browse, edit and remove courses
//! - `card`: `/card`, the shopping cart
//! - `orders`: `/orders`, place and list orders
//! - `auth`: `/auth`, log in, register, log out
//! - `profile`: `/profile`, name and avatar
//! - `health`: `/health`, store readiness check
//!
//! Page handlers take the [`RequestContext`] built by the context composer
//! and render through `crate::views`.

pub mod add;
pub mod auth;
pub mod card;
pub mod courses;
pub mod health;
pub mod home;
pub mod orders;
pub mod profile;

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::middleware::context::RequestContext;
use axum::extract::{FromRequest, Request};
use axum::Form;
use serde::de::DeserializeOwned;

/// `axum::Form` that rejects through [`AppError`], so a bad submission gets
/// the HTML error page like every other failure.
///
/// The deserializer's message names the missing or malformed field. It is
/// logged, and the client only sees a generic 400.
pub struct ValidForm<T>(pub T);

impl<T, S> FromRequest<S> for ValidForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Form::<T>::from_request(request, state).await {
            Ok(Form(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(%rejection, "form rejected");
                Err(AppError::BadRequest(
                    "The submitted form is incomplete or invalid.".into(),
                ))
            }
        }
    }
}

/// The logged-in user of a route behind `require_auth`.
fn current_user(ctx: &RequestContext) -> AppResult<User> {
    ctx.user()
        .cloned()
        .ok_or_else(|| AppError::Forbidden("login required".into()))
}

/// Parse a price typed into a form.
fn parse_price(raw: &str) -> AppResult<f64> {
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(AppError::BadRequest(format!("Invalid price: {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_must_be_non_negative_numbers() {
        assert_eq!(parse_price(" 19.99 ").unwrap(), 19.99);
        assert!(parse_price("-1").is_err());
        assert!(parse_price("free").is_err());
        assert!(parse_price("NaN").is_err());
    }
}
