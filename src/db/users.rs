use crate::db::models::User;
use crate::db::store::{collections::USERS, DocumentStore};
use crate::error::{AppError, AppResult};

/// Insert a new user.
///
/// # Errors
/// `AppError::Conflict` when another user already has `email`. The store's
/// unique index decides, so two concurrent registrations cannot both win.
pub async fn create_user(
    store: &dyn DocumentStore,
    email: &str,
    name: &str,
    password_hash: &str,
) -> AppResult<User> {
    let user = User::new(email.to_string(), name.to_string(), password_hash.to_string());

    match save(store, &user).await {
        Ok(()) => Ok(user),
        Err(AppError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => Err(
            AppError::Conflict(format!("A user with email '{}' already exists", email)),
        ),
        Err(e) => Err(e),
    }
}

pub async fn save(store: &dyn DocumentStore, user: &User) -> AppResult<()> {
    store
        .save(USERS, &user.id, &serde_json::to_value(user)?, None)
        .await
}

pub async fn find_by_email(store: &dyn DocumentStore, email: &str) -> AppResult<Option<User>> {
    let found = store.find_by_field(USERS, "email", email).await?;

    match found.into_iter().next() {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

pub async fn find_by_id(store: &dyn DocumentStore, user_id: &str) -> AppResult<User> {
    let doc = store
        .find_by_id(USERS, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id '{}' not found", user_id)))?;

    Ok(serde_json::from_value(doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::SqliteDocumentStore;

    async fn sqlite() -> SqliteDocumentStore {
        let path = std::env::temp_dir().join(format!("course-shop-users-{}.db", uuid::Uuid::new_v4()));
        SqliteDocumentStore::connect(&format!("sqlite:{}?mode=rwc", path.display()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn second_account_with_same_email_conflicts() {
        let store = sqlite().await;
        let first = create_user(&store, "ann@example.com", "Ann", "h1").await.unwrap();

        let err = create_user(&store, "ann@example.com", "Other Ann", "h2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let found = find_by_email(&store, "ann@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn saving_an_existing_user_keeps_its_email() {
        let store = sqlite().await;
        let mut user = create_user(&store, "ann@example.com", "Ann", "h1").await.unwrap();
        user.name = "Annie".into();
        save(&store, &user).await.unwrap();

        assert_eq!(find_by_id(&store, &user.id).await.unwrap().name, "Annie");
    }

    #[tokio::test]
    async fn concurrent_registrations_leave_one_account() {
        let store = sqlite().await;
        let (a, b) = tokio::join!(
            create_user(&store, "race@example.com", "A", "h"),
            create_user(&store, "race@example.com", "B", "h"),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let all = store.find_by_field("users", "email", "race@example.com").await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
