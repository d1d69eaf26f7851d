//! # Orders
//!
//! Placing an order copies every cart line, course included, into a new
//! order document and empties the cart. Later edits to a course therefore
//! never change what an old order shows or totals to.
//!
//! Both writes go to different documents without a transaction. If the user
//! save fails after the order save, the order stands and the cart keeps its
//! items.

use crate::db::models::{Order, OrderItem};
use crate::db::{orders, users};
use crate::error::AppResult;
use crate::handlers::{card::cart_lines, current_user};
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
        .route("/", get(list).post(create))
        .route_layer(middleware::from_fn(require_auth))
}

/// GET /orders
pub async fn list(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Html<String>> {
    let user = current_user(&ctx)?;
    let placed = orders::find_by_user(state.store.as_ref(), &user.id).await?;

    if placed.is_empty() {
        return Ok(views::page(&ctx, "Orders", "<p>You have no orders yet.</p>"));
    }

    let body: String = placed
        .iter()
        .map(|order| {
            let items: String = order
                .items
                .iter()
                .map(|item| {
                    format!(
                        "<li>{} &times; {}</li>",
                        escape(&item.course.title),
                        item.count
                    )
                })
                .collect();
            format!(
                r#"<div class="order"><h2>Order {id}</h2><p>{date}</p><ul>{items}</ul><p class="total">Total: {total}</p></div>"#,
                id = escape(&order.id),
                date = escape(&order.created_at),
                total = views::price(order.total()),
            )
        })
        .collect();

    Ok(views::page(&ctx, "Orders", &body))
}

/// POST /orders
///
/// Turns the cart into an order and empties the cart.
pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    flash: Flash,
) -> AppResult<Redirect> {
    let mut user = current_user(&ctx)?;
    let lines = cart_lines(state.store.as_ref(), &user.cart).await?;

    if lines.is_empty() {
        flash
            .set("order_error", "Add a course to the cart before ordering.")
            .await?;
        return Ok(Redirect::to("/card"));
    }

    let items = lines
        .into_iter()
        .map(|line| OrderItem {
            course: line.course,
            count: line.count,
        })
        .collect();
    let order = Order::new(user.id.clone(), items);
    orders::save(state.store.as_ref(), &order).await?;

    user.cart.clear();
    users::save(state.store.as_ref(), &user).await?;
    tracing::info!(order_id = %order.id, user_id = %user.id, "order placed");

    Ok(Redirect::to("/orders"))
}
