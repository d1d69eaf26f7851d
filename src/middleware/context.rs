//! # Request Context Composer
//!
//! Builds the [`RequestContext`] every page handler renders from. The work is
//! an explicit, ordered list of steps ([`PIPELINE`]); each step may add to the
//! context or halt the request with an error. Steps run strictly in order for
//! one request; different requests run independently.
//!
//! ```text
//! Identity -> Csrf -> Flash -> Variables -> Upload -> handler
//! ```
//!
//! Identity comes first so later steps can depend on the resolved user. CSRF
//! runs before Upload so a forged submission never writes a file.

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::middleware::csrf;
use crate::middleware::flash::{Flash, FlashMessages};
use crate::middleware::upload::{self, FormBody, UploadedFile};
use crate::middleware::user::{resolve_identity, IdentityOutcome};
use crate::state::AppState;
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::{header::ACCEPT, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tower_sessions::Session;

/// Everything handlers and templates know about the current request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: Option<User>,
    pub is_authenticated: bool,
    pub csrf_token: String,
    pub flash: FlashMessages,
    /// Text fields of a url-encoded or multipart body
    pub form: HashMap<String, String>,
    pub avatar: Option<UploadedFile>,
    pub path: String,
}

impl RequestContext {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// First attachment wins; the pipeline resolves identity once.
    fn attach_user(&mut self, user: User) {
        if self.user.is_some() {
            tracing::warn!(user_id = %user.id, "ignoring second user attachment");
            return;
        }
        self.user = Some(user);
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal("request context layer is not installed".into()))
    }
}

/// What a step decided.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Halt(AppError),
}

impl From<AppResult<()>> for Flow {
    fn from(result: AppResult<()>) -> Self {
        match result {
            Ok(()) => Flow::Continue,
            Err(e) => Flow::Halt(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Identity,
    Csrf,
    Flash,
    Variables,
    Upload,
}

pub const PIPELINE: [Step; 5] = [
    Step::Identity,
    Step::Csrf,
    Step::Flash,
    Step::Variables,
    Step::Upload,
];

/// The request as the steps see it.
pub struct StepInput<'a> {
    pub state: &'a AppState,
    pub session: &'a Session,
    pub parts: &'a Parts,
    pub body: &'a FormBody,
}

impl Step {
    pub async fn run(self, input: &StepInput<'_>, ctx: &mut RequestContext) -> Flow {
        match self {
            Step::Identity => identity(input, ctx).await,
            Step::Csrf => csrf_guard(input, ctx).await.into(),
            Step::Flash => flash(input, ctx).await.into(),
            Step::Variables => variables(input, ctx).await,
            Step::Upload => upload(input, ctx).await.into(),
        }
    }
}

/// Never halts. A failed lookup leaves the request anonymous.
async fn identity(input: &StepInput<'_>, ctx: &mut RequestContext) -> Flow {
    match resolve_identity(input.state.store.as_ref(), input.session).await {
        IdentityOutcome::Resolved(user) => ctx.attach_user(user),
        IdentityOutcome::Anonymous => {}
        IdentityOutcome::Failed(reason) => {
            tracing::warn!(%reason, path = %ctx.path, "continuing without a user");
        }
    }
    Flow::Continue
}

async fn csrf_guard(input: &StepInput<'_>, ctx: &mut RequestContext) -> AppResult<()> {
    let secret = csrf::ensure_secret(input.session).await?;

    if !csrf::is_safe_method(&input.parts.method) {
        let query = Query::<HashMap<String, String>>::try_from_uri(&input.parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        let token = csrf::extract_token(&input.body.fields, &query, &input.parts.headers);

        match token {
            Some(token) if csrf::verify_token(&secret, &token) => {}
            Some(_) => return Err(AppError::Forbidden("invalid csrf token".into())),
            None => return Err(AppError::Forbidden("missing csrf token".into())),
        }
    }

    ctx.csrf_token = csrf::create_token(&secret);
    Ok(())
}

/// Script calls answered with JSON render no page, so they leave pending
/// messages for the next page view.
fn wants_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

async fn flash(input: &StepInput<'_>, ctx: &mut RequestContext) -> AppResult<()> {
    if wants_json(input.parts) {
        return Ok(());
    }
    ctx.flash = Flash::new(input.session.clone()).drain_all().await?;
    Ok(())
}

/// Template variables derived from earlier steps. Never halts.
async fn variables(input: &StepInput<'_>, ctx: &mut RequestContext) -> Flow {
    ctx.is_authenticated = ctx.user.is_some();
    ctx.form = input.body.fields.clone();
    Flow::Continue
}

async fn upload(input: &StepInput<'_>, ctx: &mut RequestContext) -> AppResult<()> {
    ctx.avatar = upload::persist_avatar(&input.state.config.upload_dir, input.body).await?;
    Ok(())
}

/// The composer middleware. Must sit inside the session layer.
pub async fn compose_context(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let (form, body) = match upload::read_form(&parts, body, state.config.max_body_bytes).await {
        Ok(read) => read,
        Err(e) => return e.into_response(),
    };

    let mut ctx = RequestContext::new(parts.uri.path());
    let input = StepInput {
        state: &state,
        session: &session,
        parts: &parts,
        body: &form,
    };

    for step in PIPELINE {
        if let Flow::Halt(err) = step.run(&input, &mut ctx).await {
            tracing::debug!(?step, error = %err, "context pipeline halted");
            return err.into_response();
        }
    }

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(ctx);
    next.run(request).await
}
