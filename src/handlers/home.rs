use crate::middleware::context::RequestContext;
use crate::views::{self, escape};
use axum::response::Html;

/// GET /
pub async fn index(ctx: RequestContext) -> Html<String> {
    let greeting = match ctx.user() {
        Some(user) => format!("<p>Welcome back, {}.</p>", escape(&user.name)),
        None => r#"<p>Browse the catalogue or <a href="/auth/login">log in</a> to start shopping.</p>"#
            .to_string(),
    };

    let body = format!(r#"{greeting}<p><a href="/courses">See all courses</a></p>"#);
    views::page(&ctx, "Course shop", &body)
}
