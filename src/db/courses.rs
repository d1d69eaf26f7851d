use crate::db::models::Course;
use crate::db::store::{collections::COURSES, DocumentStore};
use crate::error::{AppError, AppResult};

pub async fn save(store: &dyn DocumentStore, course: &Course) -> AppResult<()> {
    store
        .save(COURSES, &course.id, &serde_json::to_value(course)?, None)
        .await
}

pub async fn find_all(store: &dyn DocumentStore) -> AppResult<Vec<Course>> {
    store
        .find_all(COURSES)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(AppError::from))
        .collect()
}

pub async fn find_by_id(store: &dyn DocumentStore, course_id: &str) -> AppResult<Course> {
    let doc = store
        .find_by_id(COURSES, course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course '{}' not found", course_id)))?;

    Ok(serde_json::from_value(doc)?)
}

pub async fn delete(store: &dyn DocumentStore, course_id: &str) -> AppResult<()> {
    if !store.delete(COURSES, course_id).await? {
        return Err(AppError::NotFound(format!("Course '{}' not found", course_id)));
    }
    Ok(())
}
