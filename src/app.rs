//! # Router Assembly
//!
//! ```text
//! TraceLayer
//!   security headers
//!     compression
//!       session manager (signed `shop.sid` cookie)
//!         /health
//!         pages ── body limit ── context composer ── handlers
//!         /images   uploaded avatars
//!         fallback  static assets, then the HTML 404 page
//! ```
//!
//! Only the page routes run through the context composer. Health probes and
//! static files never resolve a user or issue a CSRF token.
//!
//! Every error a client can see goes through `AppError`'s `IntoResponse`,
//! including paths nothing serves: the static file services end in
//! [`not_found`] instead of an empty 404.

use crate::error::AppError;
use crate::handlers::{add, auth, card, courses, health::health_check, home, orders, profile};
use crate::middleware::{context::compose_context, security::security_headers};
use crate::session::{self, DocumentSessionStore};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::handler::HandlerWithoutStateExt;
use axum::{middleware, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

fn pages(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .nest("/add", add::router())
        .nest("/courses", courses::router())
        .nest("/card", card::router())
        .nest("/orders", orders::router())
        .nest("/auth", auth::router())
        .nest("/profile", profile::router())
        .layer(middleware::from_fn_with_state(state.clone(), compose_context))
        // Outside the composer so both its buffering and the handlers'
        // extractors see the configured limit.
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
}

/// Answer for any path no route or file matches.
async fn not_found() -> AppError {
    AppError::NotFound("This page does not exist.".into())
}

pub fn router(state: AppState, sessions: DocumentSessionStore) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(health_check))
        .merge(pages(&state))
        .nest_service(
            "/images",
            ServeDir::new(&config.upload_dir).not_found_service(not_found.into_service()),
        )
        .fallback_service(
            ServeDir::new(&config.static_dir).not_found_service(not_found.into_service()),
        )
        // Layers run outermost-last: trace sees every request first
        .layer(session::layer(sessions, &config))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory::MemoryDocumentStore;
    use crate::db::store::collections::{COURSES, ORDERS, SESSIONS, USERS};
    use crate::db::store::DocumentStore;
    use crate::db::models::{Course, User};
    use crate::db::{courses as course_repo, users};
    use axum::body::Body;
    use axum::http::{header, Request, Response, StatusCode};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    const EMAIL: &str = "ann@example.com";
    const PASSWORD: &str = "secret-password";

    struct TestApp {
        app: Router,
        store: MemoryDocumentStore,
        upload_dir: PathBuf,
        cookie: Option<String>,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_config(|_| {})
        }

        fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
            let store = MemoryDocumentStore::new();
            let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
            let upload_dir = std::env::temp_dir().join(format!("course-shop-app-{}", Uuid::new_v4()));
            let mut config = Config::for_tests(upload_dir.clone());
            adjust(&mut config);
            let state = AppState::with_store(shared.clone(), config);

            Self {
                app: router(state, DocumentSessionStore::new(shared)),
                store,
                upload_dir,
                cookie: None,
            }
        }

        async fn send(&mut self, mut request: Request<Body>) -> Response<Body> {
            if let Some(cookie) = &self.cookie {
                request
                    .headers_mut()
                    .insert(header::COOKIE, cookie.parse().unwrap());
            }

            let response = self.app.clone().oneshot(request).await.unwrap();

            let issued = response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find(|v| v.starts_with("shop.sid="))
                .and_then(|v| v.split(';').next())
                .map(str::to_string);
            if issued.is_some() {
                self.cookie = issued;
            }
            response
        }

        async fn get(&mut self, uri: &str) -> (StatusCode, String) {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = self.send(request).await;
            let status = response.status();
            (status, body_text(response).await)
        }

        async fn post_form(&mut self, uri: &str, body: &str) -> Response<Body> {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.send(request).await
        }

        /// GET a page and pull the CSRF token out of its form.
        async fn token(&mut self, uri: &str) -> String {
            let (status, html) = self.get(uri).await;
            assert_eq!(status, StatusCode::OK, "GET {uri}");
            csrf_from(&html)
        }

        async fn register_and_login(&mut self) {
            let token = self.token("/auth/login").await;
            let response = self
                .post_form(
                    "/auth/register",
                    &format!(
                        "_csrf={token}&email={EMAIL}&name=Ann&password={PASSWORD}&confirm={PASSWORD}"
                    ),
                )
                .await;
            assert_eq!(location(&response), "/auth/login");

            let token = self.token("/auth/login").await;
            let response = self
                .post_form(
                    "/auth/login",
                    &format!("_csrf={token}&email={EMAIL}&password={PASSWORD}"),
                )
                .await;
            assert_eq!(location(&response), "/");
        }

        async fn user(&self) -> User {
            users::find_by_email(&self.store, EMAIL).await.unwrap().unwrap()
        }
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn csrf_from(html: &str) -> String {
        let marker = r#"name="_csrf" value=""#;
        let start = html.find(marker).expect("page has no csrf field") + marker.len();
        let end = html[start..].find('"').unwrap();
        html[start..start + end].to_string()
    }

    fn location(response: &Response<Body>) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn first_visit_gets_a_session_and_an_anonymous_page() {
        let mut app = TestApp::new();
        let (status, html) = app.get("/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(app.cookie.is_some());
        assert!(html.contains(r#"href="/auth/login""#));
        assert!(!html.contains(r#"href="/auth/logout""#));
        assert_eq!(app.store.count(SESSIONS).await, 1);

        // The stored record is found again through the cookie
        let (status, _) = app.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.store.count(SESSIONS).await, 1);
    }

    #[tokio::test]
    async fn unknown_paths_get_the_html_error_page() {
        let mut app = TestApp::new();
        for uri in ["/no-such-page", "/images/missing.png"] {
            let (status, html) = app.get(uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");
            assert!(html.contains("404"), "GET {uri}");
            assert!(html.contains("This page does not exist."), "GET {uri}");
        }
    }

    #[tokio::test]
    async fn incomplete_form_is_a_bad_request_page() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let token = app.token("/add").await;
        let response = app.post_form("/add", &format!("_csrf={token}&title=Rust")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let html = body_text(response).await;
        assert!(html.contains("The submitted form is incomplete or invalid."));
        assert!(!html.contains("missing field"));
        assert_eq!(app.store.count(COURSES).await, 0);
    }

    #[tokio::test]
    async fn health_and_responses_carry_security_headers() {
        let mut app = TestApp::new();
        let response = app
            .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["referrer-policy"], "no-referrer");
        assert!(app.cookie.is_none());
    }

    #[tokio::test]
    async fn protected_pages_redirect_anonymous_visitors() {
        let mut app = TestApp::new();
        for uri in ["/add", "/card", "/orders", "/profile"] {
            let response = app
                .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "GET {uri}");
            assert_eq!(location(&response), "/auth/login");
        }
    }

    #[tokio::test]
    async fn post_without_token_is_rejected_before_the_handler() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let response = app
            .post_form("/add", "title=Rust&price=10&img=http://img/rust.png")
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.store.count(COURSES).await, 0);

        let response = app
            .post_form("/add", "_csrf=forged-token&title=Rust&price=10&img=http://img/rust.png")
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.store.count(COURSES).await, 0);
    }

    #[tokio::test]
    async fn post_with_token_creates_a_course() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let token = app.token("/add").await;
        let response = app
            .post_form(
                "/add",
                &format!("_csrf={token}&title=Rust&price=10&img=http://img/rust.png"),
            )
            .await;
        assert_eq!(location(&response), "/courses");
        assert_eq!(app.store.count(COURSES).await, 1);

        let (_, html) = app.get("/courses").await;
        assert!(html.contains("Rust"));
        assert!(html.contains("$10.00"));
    }

    #[tokio::test]
    async fn flash_is_shown_once() {
        let mut app = TestApp::new();
        let token = app.token("/auth/login").await;
        let response = app
            .post_form(
                "/auth/login",
                &format!("_csrf={token}&email=nobody@example.com&password=wrong"),
            )
            .await;
        assert_eq!(location(&response), "/auth/login");

        let (_, next) = app.get("/auth/login").await;
        assert!(next.contains("Wrong email or password."));

        let (_, after) = app.get("/auth/login").await;
        assert!(!after.contains("Wrong email or password."));
    }

    #[tokio::test]
    async fn user_store_outage_degrades_to_anonymous() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let (_, html) = app.get("/").await;
        assert!(html.contains("Welcome back, Ann."));

        app.store.fail_collection(USERS).await;
        let (status, html) = app.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains(r#"href="/auth/login""#));

        app.store.recover(USERS).await;
        let (_, html) = app.get("/").await;
        assert!(html.contains("Welcome back, Ann."));
    }

    #[tokio::test]
    async fn logout_forgets_the_user() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let response = app
            .send(Request::builder().uri("/auth/logout").body(Body::empty()).unwrap())
            .await;
        assert_eq!(location(&response), "/auth/login");

        let (_, html) = app.get("/").await;
        assert!(!html.contains("Welcome back"));
    }

    #[tokio::test]
    async fn avatar_upload_updates_the_profile() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let token = app.token("/profile").await;
        let body = format!(
            "--XYZ\r\n\
             Content-Disposition: form-data; name=\"_csrf\"\r\n\r\n\
             {token}\r\n\
             --XYZ\r\n\
             Content-Disposition: form-data; name=\"name\"\r\n\r\n\
             Annie\r\n\
             --XYZ\r\n\
             Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --XYZ--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/profile")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
            .body(Body::from(body))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(location(&response), "/profile");

        let user = app.user().await;
        assert_eq!(user.name, "Annie");
        let url = user.avatar_url.unwrap();
        let stored = url.strip_prefix("/images/").unwrap();
        assert!(stored.ends_with("-me.png"));
        assert!(app.upload_dir.join(stored).exists());

        let (status, html) = app.get("/profile").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains(&url));
        assert!(html.contains("Profile updated."));
    }

    #[tokio::test]
    async fn avatar_above_axum_default_limit_is_accepted() {
        let mut app = TestApp::with_config(|config| config.max_body_bytes = 5 * 1024 * 1024);
        app.register_and_login().await;

        let token = app.token("/profile").await;
        let image = vec![0x42u8; 3 * 1024 * 1024];
        let mut body = format!(
            "--XYZ\r\n\
             Content-Disposition: form-data; name=\"_csrf\"\r\n\r\n\
             {token}\r\n\
             --XYZ\r\n\
             Content-Disposition: form-data; name=\"avatar\"; filename=\"big.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&image);
        body.extend_from_slice(b"\r\n--XYZ--\r\n");

        let request = Request::builder()
            .method("POST")
            .uri("/profile")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
            .body(Body::from(body))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile");

        let url = app.user().await.avatar_url.unwrap();
        let stored = app.upload_dir.join(url.strip_prefix("/images/").unwrap());
        assert_eq!(std::fs::metadata(stored).unwrap().len(), image.len() as u64);
    }

    #[tokio::test]
    async fn body_above_configured_limit_is_rejected() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let token = app.token("/add").await;
        let padding = "x".repeat(2 * 1024 * 1024);
        let response = app
            .post_form(
                "/add",
                &format!("_csrf={token}&title={padding}&price=1&img=http://img/a.png"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.store.count(COURSES).await, 0);
    }

    #[tokio::test]
    async fn script_calls_do_not_consume_flash() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let token = app.token("/add").await;
        let response = app.post_form("/orders", &format!("_csrf={token}")).await;
        assert_eq!(location(&response), "/card");

        let request = Request::builder()
            .method("DELETE")
            .uri("/card/remove/unknown-course")
            .header("x-csrf-token", token)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let (_, html) = app.get("/card").await;
        assert!(html.contains("Add a course to the cart before ordering."));
    }

    #[tokio::test]
    async fn cart_to_order() {
        let mut app = TestApp::new();
        app.register_and_login().await;
        let owner = app.user().await;

        let first = Course::new("Rust".into(), 10.0, "http://img/rust.png".into(), owner.id.clone());
        let second = Course::new("Axum".into(), 2.5, "http://img/axum.png".into(), owner.id);
        course_repo::save(&app.store, &first).await.unwrap();
        course_repo::save(&app.store, &second).await.unwrap();

        for id in [&first.id, &first.id, &second.id] {
            let token = app.token("/courses").await;
            let response = app.post_form("/card/add", &format!("_csrf={token}&id={id}")).await;
            assert_eq!(location(&response), "/card");
        }

        let (_, html) = app.get("/card").await;
        assert!(html.contains("Total: $22.50"));

        // The cart page script sends its token in a header
        let token = csrf_from(&html);
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/card/remove/{}", first.id))
            .header("x-csrf-token", token)
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cart: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(cart["total"], 12.5);

        let token = app.token("/card").await;
        let response = app.post_form("/orders", &format!("_csrf={token}")).await;
        assert_eq!(location(&response), "/orders");
        assert!(app.user().await.cart.is_empty());

        let (_, html) = app.get("/orders").await;
        assert!(html.contains("Total: $12.50"));
    }

    #[tokio::test]
    async fn ordering_an_empty_cart_flashes_an_error() {
        let mut app = TestApp::new();
        app.register_and_login().await;

        let token = app.token("/add").await;
        let response = app.post_form("/orders", &format!("_csrf={token}")).await;
        assert_eq!(location(&response), "/card");

        let (_, html) = app.get("/card").await;
        assert!(html.contains("Add a course to the cart before ordering."));
        assert_eq!(app.store.count(ORDERS).await, 0);
    }
}
