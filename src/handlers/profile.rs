//! # Profile
//!
//! Name and avatar of the logged-in user. The form is multipart; by the time
//! `update` runs, the context composer has parsed it, checked its CSRF field
//! and written an accepted `avatar` file to the upload directory. The handler
//! only records the outcome.

use crate::db::users;
use crate::error::AppResult;
use crate::handlers::current_user;
use crate::middleware::{auth::require_auth, context::RequestContext, flash::Flash};
use crate::state::AppState;
use crate::views::{self, escape};
use axum::{
    extract::State,
    middleware,
    response::{Html, Redirect},
    routing::get,
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).post(update))
        .route_layer(middleware::from_fn(require_auth))
}

/// GET /profile
pub async fn show(ctx: RequestContext) -> AppResult<Html<String>> {
    let user = current_user(&ctx)?;

    let avatar = match &user.avatar_url {
        Some(url) => format!(r#"<img class="avatar" src="{}" alt="avatar">"#, escape(url)),
        None => r#"<p class="avatar-missing">No avatar yet.</p>"#.to_string(),
    };

    let body = format!(
        r#"<div class="profile">
{avatar}
<p>{email}</p>
<form action="/profile" method="POST" enctype="multipart/form-data">
{csrf}
<label>Name <input name="name" value="{name}" required></label>
<label>Avatar <input name="avatar" type="file" accept="image/png,image/jpeg"></label>
<button type="submit">Save</button>
</form>
</div>"#,
        email = escape(&user.email),
        name = escape(&user.name),
        csrf = views::csrf_field(&ctx),
    );
    Ok(views::page(&ctx, "Profile", &body))
}

/// POST /profile
///
/// The composer has already parsed the multipart body and stored an accepted
/// avatar; this only records the result on the user.
pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    flash: Flash,
) -> AppResult<Redirect> {
    let mut user = current_user(&ctx)?;

    if let Some(name) = ctx.field("name").map(str::trim).filter(|n| !n.is_empty()) {
        user.name = name.to_string();
    }
    if let Some(avatar) = &ctx.avatar {
        tracing::debug!(stored = %avatar.stored_name, size = avatar.size, "avatar replaced");
        user.avatar_url = Some(avatar.url.clone());
    }

    users::save(state.store.as_ref(), &user).await?;
    flash.set("notice", "Profile updated.").await?;

    Ok(Redirect::to("/profile"))
}
