use crate::db::models::Order;
use crate::db::store::{collections::ORDERS, DocumentStore};
use crate::error::{AppError, AppResult};

pub async fn save(store: &dyn DocumentStore, order: &Order) -> AppResult<()> {
    store
        .save(ORDERS, &order.id, &serde_json::to_value(order)?, None)
        .await
}

/// Orders placed by one user, oldest first.
pub async fn find_by_user(store: &dyn DocumentStore, user_id: &str) -> AppResult<Vec<Order>> {
    store
        .find_by_field(ORDERS, "user_id", user_id)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(AppError::from))
        .collect()
}
