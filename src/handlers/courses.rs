//! # Course Catalogue
//!
//! Browsing is public. Editing and removal sit behind `require_auth`, and on
//! top of that every change checks ownership: a logged-in user who is not
//! the author gets 403, not a redirect.
//!
//! ## Routes
//! - `GET /courses`, `GET /courses/{id}`: anyone
//! - `GET /courses/{id}/edit`, `POST /courses/edit`, `POST /courses/remove`:
//!   the author only

use crate::db::courses;
use crate::db::models::Course;
use crate::error::{AppError, AppResult};
use crate::handlers::{current_user, parse_price, ValidForm};
use crate::middleware::{auth::require_auth, context::RequestContext};
use crate::state::AppState;
use crate::views::{self, escape};
use axum::{
    extract::{Path, State},
    middleware,
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EditForm {
    pub id: String,
    pub title: String,
    pub price: String,
    pub img: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveForm {
    pub id: String,
}

pub fn router() -> Router<AppState> {
    let owner_routes = Router::new()
        .route("/{id}/edit", get(edit_page))
        .route("/edit", post(update))
        .route("/remove", post(remove))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show))
        .merge(owner_routes)
}

/// Only the author of a course may change it.
fn owned_by(course: &Course, ctx: &RequestContext) -> AppResult<()> {
    let user = current_user(ctx)?;
    if course.user_id != user.id {
        return Err(AppError::Forbidden("only the author can change this course".into()));
    }
    Ok(())
}

fn course_card(course: &Course, ctx: &RequestContext) -> String {
    let mut actions = format!(r#"<a href="/courses/{}">Open</a>"#, escape(&course.id));

    if let Some(user) = ctx.user() {
        if user.id == course.user_id {
            actions.push_str(&format!(
                r#" <a href="/courses/{}/edit">Edit</a>"#,
                escape(&course.id)
            ));
        }
        actions.push_str(&format!(
            r#"<form action="/card/add" method="POST">{}<input type="hidden" name="id" value="{}"><button type="submit">Buy</button></form>"#,
            views::csrf_field(ctx),
            escape(&course.id)
        ));
    }

    format!(
        r#"<div class="course"><img src="{img}" alt="{title}"><h2>{title}</h2><p class="price">{price}</p>{actions}</div>"#,
        img = escape(&course.img),
        title = escape(&course.title),
        price = views::price(course.price),
    )
}

/// GET /courses
pub async fn list(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Html<String>> {
    let all = courses::find_all(state.store.as_ref()).await?;

    let body = if all.is_empty() {
        "<p>No courses yet.</p>".to_string()
    } else {
        all.iter().map(|course| course_card(course, &ctx)).collect()
    };
    Ok(views::page(&ctx, "Courses", &body))
}

/// GET /courses/{id}
pub async fn show(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let course = courses::find_by_id(state.store.as_ref(), &id).await?;
    Ok(views::page(&ctx, &course.title, &course_card(&course, &ctx)))
}

/// GET /courses/{id}/edit
pub async fn edit_page(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let course = courses::find_by_id(state.store.as_ref(), &id).await?;
    owned_by(&course, &ctx)?;

    let csrf = views::csrf_field(&ctx);
    let body = format!(
        r#"<form action="/courses/edit" method="POST" class="course-form">
{csrf}
<input type="hidden" name="id" value="{id}">
<label>Title <input name="title" value="{title}" required></label>
<label>Price <input name="price" type="number" step="0.01" min="0" value="{price}" required></label>
<label>Image URL <input name="img" type="url" value="{img}" required></label>
<button type="submit">Save</button>
</form>
<form action="/courses/remove" method="POST">
{csrf}
<input type="hidden" name="id" value="{id}">
<button type="submit" class="danger">Remove course</button>
</form>"#,
        id = escape(&course.id),
        title = escape(&course.title),
        price = course.price,
        img = escape(&course.img),
    );
    Ok(views::page(&ctx, "Edit course", &body))
}

/// POST /courses/edit
pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidForm(form): ValidForm<EditForm>,
) -> AppResult<Redirect> {
    let mut course = courses::find_by_id(state.store.as_ref(), &form.id).await?;
    owned_by(&course, &ctx)?;

    course.title = form.title.trim().to_string();
    course.price = parse_price(&form.price)?;
    course.img = form.img.trim().to_string();
    courses::save(state.store.as_ref(), &course).await?;

    Ok(Redirect::to("/courses"))
}

/// POST /courses/remove
pub async fn remove(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidForm(form): ValidForm<RemoveForm>,
) -> AppResult<Redirect> {
    let course = courses::find_by_id(state.store.as_ref(), &form.id).await?;
    owned_by(&course, &ctx)?;

    courses::delete(state.store.as_ref(), &course.id).await?;
    tracing::info!(course_id = %course.id, "course removed");

    Ok(Redirect::to("/courses"))
}
