//! # Add Course
//!
//! The form for publishing a course. Only logged-in users reach it; the
//! author is whoever is logged in, and only they may edit or remove the
//! course later (see `courses`).
//!
//! ## Routes
//! - `GET /add`: empty form
//! - `POST /add`: validate, store, redirect to `/courses`

use crate::db::courses;
use crate::db::models::Course;
use crate::error::AppResult;
use crate::handlers::{current_user, parse_price, ValidForm};
use crate::middleware::{auth::require_auth, context::RequestContext};
use crate::state::AppState;
use crate::views;
use axum::{
    extract::State,
    middleware,
    response::{Html, Redirect},
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CourseForm {
    pub title: String,
    pub price: String,
    pub img: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(new_course).post(create_course))
        .route_layer(middleware::from_fn(require_auth))
}

/// GET /add
pub async fn new_course(ctx: RequestContext) -> Html<String> {
    let body = format!(
        r#"<form action="/add" method="POST" class="course-form">
{csrf}
<label>Title <input name="title" required></label>
<label>Price <input name="price" type="number" step="0.01" min="0" required></label>
<label>Image URL <input name="img" type="url" required></label>
<button type="submit">Add course</button>
</form>"#,
        csrf = views::csrf_field(&ctx),
    );
    views::page(&ctx, "Add course", &body)
}

/// POST /add
pub async fn create_course(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidForm(form): ValidForm<CourseForm>,
) -> AppResult<Redirect> {
    let user = current_user(&ctx)?;
    let price = parse_price(&form.price)?;

    let course = Course::new(form.title.trim().to_string(), price, form.img.trim().to_string(), user.id);
    courses::save(state.store.as_ref(), &course).await?;
    tracing::info!(course_id = %course.id, "course created");

    Ok(Redirect::to("/courses"))
}
