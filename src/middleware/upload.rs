//! # Form Bodies and Avatar Uploads
//!
//! The context composer buffers url-encoded and multipart bodies once so the
//! CSRF step can read `_csrf` from them and the handler still receives the
//! original bytes. Multipart file parts stay in memory until the upload step
//! decides whether to keep the `avatar` file.

use crate::error::{AppError, AppResult};
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::{header::CONTENT_TYPE, request::Parts, Request};
use axum::Form;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// The only file field the application accepts.
pub const AVATAR_FIELD: &str = "avatar";

/// URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/images";

const ALLOWED_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// A file part held in memory until the upload step runs.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Parsed text fields and file parts of a form submission.
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    pub fields: HashMap<String, String>,
    pub files: Vec<PendingFile>,
}

/// Metadata of an accepted upload, attached to the request context.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadedFile {
    pub field: String,
    pub original_name: String,
    pub content_type: String,
    /// File name inside the upload directory
    pub stored_name: String,
    /// Where the file is served from
    pub url: String,
    pub size: usize,
}

enum BodyKind {
    UrlEncoded,
    Multipart,
    Other,
}

fn body_kind(parts: &Parts) -> BodyKind {
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/x-www-form-urlencoded") {
        BodyKind::UrlEncoded
    } else if content_type.starts_with("multipart/form-data") {
        BodyKind::Multipart
    } else {
        BodyKind::Other
    }
}

/// Buffer and parse a form body.
///
/// Returns the parsed form and a body carrying the same bytes for the
/// handler. Bodies of any other content type pass through untouched and
/// yield an empty form.
pub async fn read_form(parts: &Parts, body: Body, limit: usize) -> AppResult<(FormBody, Body)> {
    let kind = body_kind(parts);
    if matches!(kind, BodyKind::Other) {
        return Ok((FormBody::default(), body));
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| AppError::BadRequest(format!("Unreadable request body: {e}")))?;

    let form = match kind {
        BodyKind::UrlEncoded => parse_urlencoded(parts, bytes.clone()).await?,
        BodyKind::Multipart => parse_multipart(parts, bytes.clone()).await?,
        BodyKind::Other => FormBody::default(),
    };

    Ok((form, Body::from(bytes)))
}

fn replay(parts: &Parts, bytes: Bytes) -> AppResult<Request<Body>> {
    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone());
    if let Some(content_type) = parts.headers.get(CONTENT_TYPE) {
        builder = builder.header(CONTENT_TYPE, content_type.clone());
    }

    let mut request = builder
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("Failed to rebuild request: {e}")))?;
    // Carries the router's `DefaultBodyLimit`; without it the extractors
    // fall back to axum's 2 MiB default.
    *request.extensions_mut() = parts.extensions.clone();
    Ok(request)
}

async fn parse_urlencoded(parts: &Parts, bytes: Bytes) -> AppResult<FormBody> {
    let request = replay(parts, bytes)?;
    let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form body: {e}")))?;

    Ok(FormBody {
        fields,
        files: Vec::new(),
    })
}

async fn parse_multipart(parts: &Parts, bytes: Bytes) -> AppResult<FormBody> {
    let request = replay(parts, bytes)?;
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?;

    let mut form = FormBody::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid file part: {e}")))?;
                form.files.push(PendingFile {
                    field: name,
                    file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid text part: {e}")))?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

/// Write the `avatar` part to `dir` if there is one and it is an image.
///
/// Parts of other types are dropped without an error, and so is the empty
/// part a browser sends when no file was chosen.
pub async fn persist_avatar(dir: &Path, form: &FormBody) -> AppResult<Option<UploadedFile>> {
    let Some(file) = form.files.iter().find(|f| f.field == AVATAR_FIELD) else {
        return Ok(None);
    };
    if file.data.is_empty() {
        return Ok(None);
    }
    if !ALLOWED_TYPES.contains(&file.content_type.as_str()) {
        tracing::debug!(content_type = %file.content_type, "ignoring avatar of unsupported type");
        return Ok(None);
    }

    tokio::fs::create_dir_all(dir).await?;
    let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&file.file_name));
    tokio::fs::write(dir.join(&stored_name), &file.data).await?;

    Ok(Some(UploadedFile {
        field: file.field.clone(),
        original_name: file.file_name.clone(),
        content_type: file.content_type.clone(),
        url: format!("{PUBLIC_PREFIX}/{stored_name}"),
        stored_name,
        size: file.data.len(),
    }))
}

/// Keep the final path component, restricted to a conservative charset.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
