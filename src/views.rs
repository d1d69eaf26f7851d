//! # Views
//!
//! HTML is assembled in Rust with `format!`. Every value that comes from a
//! user or the store goes through [`escape`] first. Handlers build their page
//! body and wrap it with [`page`], which adds the layout, navigation and
//! pending flash messages.

use crate::middleware::context::RequestContext;
use crate::middleware::csrf;
use axum::http::StatusCode;
use axum::response::Html;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn price(value: f64) -> String {
    format!("${value:.2}")
}

/// Hidden input carrying the request's CSRF token.
pub fn csrf_field(ctx: &RequestContext) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        csrf::FIELD_NAME,
        escape(&ctx.csrf_token)
    )
}

fn nav(ctx: &RequestContext) -> String {
    let link = |href: &str, label: &str| {
        let active = if ctx.path == href { r#" class="active""# } else { "" };
        format!(r#"<li><a href="{href}"{active}>{label}</a></li>"#)
    };

    let mut items = vec![link("/", "Home"), link("/courses", "Courses")];
    if ctx.is_authenticated {
        items.push(link("/add", "Add course"));
        items.push(link("/card", "Cart"));
        items.push(link("/orders", "Orders"));
        items.push(link("/profile", "Profile"));
        items.push(link("/auth/logout", "Log out"));
    } else {
        items.push(link("/auth/login", "Log in"));
    }

    format!(r#"<nav><ul>{}</ul></nav>"#, items.concat())
}

fn flash_block(ctx: &RequestContext) -> String {
    ctx.flash
        .iter()
        .flat_map(|(key, messages)| {
            messages.iter().map(move |message| {
                format!(
                    r#"<p class="flash flash-{}">{}</p>"#,
                    escape(key),
                    escape(message)
                )
            })
        })
        .collect()
}

fn layout(title: &str, nav: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/index.css">
<script src="/app.js" defer></script>
</head><body>
{nav}
<main class="container">
{content}
</main>
</body></html>"#,
        title = escape(title),
    )
}

/// A complete page for the current request.
pub fn page(ctx: &RequestContext, title: &str, body: &str) -> Html<String> {
    let content = format!("{}\n<h1>{}</h1>\n{}", flash_block(ctx), escape(title), body);
    Html(layout(title, &nav(ctx), &content))
}

/// Rendered by the catch-all error stage, which has no request context.
pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    let content = format!(
        r#"<h1>{} {}</h1><p>{}</p><p><a href="/">Back to the shop</a></p>"#,
        status.as_u16(),
        escape(title),
        escape(message)
    );
    Html(layout(title, "", &content))
}
