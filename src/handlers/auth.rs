//! Password login, registration and logout.
//!
//! Failures never render an error page. They leave a flash message
//! (`login_error` or `register_error`) and redirect back to the login page,
//! where the layout shows it.

use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::handlers::ValidForm;
use crate::middleware::{context::RequestContext, flash::Flash};
use crate::password;
use crate::session::keys;
use crate::state::AppState;
use crate::views;
use axum::{
    extract::State,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_sessions::Session;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub name: String,
    pub password: String,
    pub confirm: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", post(register))
        .route("/logout", get(logout))
}

/// GET /auth/login
pub async fn login_page(ctx: RequestContext) -> Html<String> {
    let csrf = views::csrf_field(&ctx);
    let body = format!(
        r#"<section class="auth">
<h2>Log in</h2>
<form action="/auth/login" method="POST">
{csrf}
<label>Email <input name="email" type="email" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Log in</button>
</form>
</section>
<section class="auth">
<h2>Register</h2>
<form action="/auth/register" method="POST">
{csrf}
<label>Email <input name="email" type="email" required></label>
<label>Name <input name="name" required></label>
<label>Password <input name="password" type="password" required></label>
<label>Repeat password <input name="confirm" type="password" required></label>
<button type="submit">Register</button>
</form>
</section>"#,
    );
    views::page(&ctx, "Authorization", &body)
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    flash: Flash,
    ValidForm(form): ValidForm<LoginForm>,
) -> AppResult<Redirect> {
    let email = form.email.trim().to_lowercase();
    let user = users::find_by_email(state.store.as_ref(), &email).await?;

    let user = match user {
        Some(user) if password::verify(&user.password_hash, &form.password).await? => user,
        _ => {
            tracing::debug!(%email, "login rejected");
            flash.set("login_error", "Wrong email or password.").await?;
            return Ok(Redirect::to("/auth/login"));
        }
    };

    // New id on privilege change; the record's data is carried over.
    session.cycle_id().await?;
    session.insert(keys::USER_ID, &user.id).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Redirect::to("/"))
}

fn validate(form: &RegisterForm) -> Result<(), &'static str> {
    if !form.email.contains('@') {
        return Err("Enter a valid email address.");
    }
    if form.name.trim().is_empty() {
        return Err("Name must not be empty.");
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters.");
    }
    if form.password != form.confirm {
        return Err("Passwords do not match.");
    }
    Ok(())
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    flash: Flash,
    ValidForm(form): ValidForm<RegisterForm>,
) -> AppResult<Redirect> {
    if let Err(message) = validate(&form) {
        flash.set("register_error", message).await?;
        return Ok(Redirect::to("/auth/login"));
    }

    let email = form.email.trim().to_lowercase();
    if users::find_by_email(state.store.as_ref(), &email).await?.is_some() {
        flash
            .set("register_error", "A user with this email already exists.")
            .await?;
        return Ok(Redirect::to("/auth/login"));
    }

    let hash = password::hash(&form.password).await?;
    // The lookup above is only a fast path; the store has the final say.
    let user = match users::create_user(state.store.as_ref(), &email, form.name.trim(), &hash).await {
        Ok(user) => user,
        Err(AppError::Conflict(reason)) => {
            tracing::debug!(%reason, "registration lost a race");
            flash
                .set("register_error", "A user with this email already exists.")
                .await?;
            return Ok(Redirect::to("/auth/login"));
        }
        Err(e) => return Err(e),
    };
    tracing::info!(user_id = %user.id, "user registered");

    flash.set("notice", "Account created, you can log in now.").await?;
    Ok(Redirect::to("/auth/login"))
}

/// GET /auth/logout
pub async fn logout(session: Session) -> AppResult<Redirect> {
    session.flush().await?;
    Ok(Redirect::to("/auth/login"))
}
