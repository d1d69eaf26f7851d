//! The shopping cart. It is stored inside the user document.

use crate::db::models::{Cart, Course};
use crate::db::store::DocumentStore;
use crate::db::{courses, users};
use crate::error::{AppError, AppResult};
use crate::handlers::{current_user, ValidForm};
use crate::middleware::{auth::require_auth, context::RequestContext};
use crate::state::AppState;
use crate::views::{self, escape};
use axum::{
    extract::{Path, State},
    middleware,
    response::{Html, Redirect},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AddForm {
    pub id: String,
}

/// One cart line joined with its course.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub course: Course,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: f64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show))
        .route("/add", post(add))
        .route("/remove/{id}", delete(remove))
        .route_layer(middleware::from_fn(require_auth))
}

/// Join cart items with their courses. Items whose course has since been
/// removed are skipped.
pub async fn cart_lines(store: &dyn DocumentStore, cart: &Cart) -> AppResult<Vec<CartLine>> {
    if cart.is_empty() {
        return Ok(Vec::new());
    }

    let mut lines = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        match courses::find_by_id(store, &item.course_id).await {
            Ok(course) => lines.push(CartLine {
                course,
                count: item.count,
            }),
            Err(AppError::NotFound(_)) => {
                tracing::debug!(course_id = %item.course_id, "skipping removed course in cart");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(lines)
}

pub fn total(lines: &[CartLine]) -> f64 {
    lines
        .iter()
        .map(|line| line.course.price * f64::from(line.count))
        .sum()
}

/// GET /card
pub async fn show(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Html<String>> {
    let user = current_user(&ctx)?;
    let lines = cart_lines(state.store.as_ref(), &user.cart).await?;

    if lines.is_empty() {
        return Ok(views::page(&ctx, "Cart", "<p>Your cart is empty.</p>"));
    }

    let rows: String = lines
        .iter()
        .map(|line| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td>{}</td><td><button class="js-remove" data-id="{}">Remove</button></td></tr>"#,
                escape(&line.course.title),
                line.count,
                views::price(line.course.price),
                escape(&line.course.id)
            )
        })
        .collect();

    let body = format!(
        r#"<table class="cart" data-csrf="{csrf_token}">
<thead><tr><th>Course</th><th>Count</th><th>Price</th><th></th></tr></thead>
<tbody>{rows}</tbody>
</table>
<p class="total">Total: {total}</p>
<form action="/orders" method="POST">{csrf}<button type="submit">Place order</button></form>"#,
        csrf_token = escape(&ctx.csrf_token),
        csrf = views::csrf_field(&ctx),
        total = views::price(total(&lines)),
    );
    Ok(views::page(&ctx, "Cart", &body))
}

/// POST /card/add
pub async fn add(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidForm(form): ValidForm<AddForm>,
) -> AppResult<Redirect> {
    let mut user = current_user(&ctx)?;
    let course = courses::find_by_id(state.store.as_ref(), &form.id).await?;

    user.cart.add(&course.id);
    users::save(state.store.as_ref(), &user).await?;

    Ok(Redirect::to("/card"))
}

/// DELETE /card/remove/{id}
///
/// Called from the cart page script with the token in an `x-csrf-token`
/// header; answers with the updated cart.
pub async fn remove(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(course_id): Path<String>,
) -> AppResult<Json<CartView>> {
    let mut user = current_user(&ctx)?;

    if user.cart.remove(&course_id) {
        users::save(state.store.as_ref(), &user).await?;
    }

    let lines = cart_lines(state.store.as_ref(), &user.cart).await?;
    let sum = total(&lines);
    Ok(Json(CartView { lines, total: sum }))
}
