//! Presentation directory: an index page at the base path, files below it.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use maud::{DOCTYPE, Markup, html};
use std::path::Path;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::warn;

use crate::AppState;

/// `GET {base}`: one link per entry of the presentation directory
pub async fn presentation_index(State(state): State<AppState>) -> Response {
    match list_presentations(&state.config.presentation_path).await {
        Ok(names) => Html(render_index(&names).into_string()).into_response(),
        Err(e) => {
            warn!(
                path = %state.config.presentation_path.display(),
                "Unable to build presentation listing: {}", e
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Everything else under `{base}` is served from the presentation directory.
pub async fn presentation_files(State(state): State<AppState>, request: Request) -> Response {
    let Some(uri) = strip_base(request.uri(), &state.config.base_path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let (mut parts, body) = request.into_parts();
    parts.uri = uri;
    let request = Request::from_parts(parts, body);

    match ServeDir::new(&state.config.presentation_path)
        .oneshot(request)
        .await
    {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

async fn list_presentations(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn render_index(names: &[String]) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Presentations" }
            }
            body {
                ul {
                    @for name in names {
                        li { a href={ (encode_uri(name)) "/" } { (name) } }
                    }
                }
            }
        }
    }
}

/// Rewrite `{base}rest?query` to `/rest?query`.
fn strip_base(uri: &Uri, base_path: &str) -> Option<Uri> {
    let rest = uri.path().strip_prefix(base_path)?;
    let rewritten = match uri.query() {
        Some(query) => format!("/{rest}?{query}"),
        None => format!("/{rest}"),
    };
    rewritten.parse().ok()
}

/// Percent-encode everything except the characters a URI may carry
/// literally, so names with spaces or non-ASCII text still link correctly.
fn encode_uri(name: &str) -> String {
    const KEEP: &[u8] = b";,/?:@&=+$-_.!~*'()#";
    let mut out = String::with_capacity(name.len());
    for &byte in name.as_bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    use crate::test_helpers::test_app_state;

    async fn get(base: &str, uri: &str, populate: impl FnOnce(&Path)) -> (StatusCode, String) {
        let (state, tmp) = test_app_state(base);
        populate(tmp.path());
        let app = crate::build_router(state).unwrap();
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[test]
    fn test_encode_uri() {
        assert_eq!(encode_uri("intro-deck"), "intro-deck");
        assert_eq!(encode_uri("my talk"), "my%20talk");
        assert_eq!(encode_uri("ü"), "%C3%BC");
        assert_eq!(encode_uri("a<b>"), "a%3Cb%3E");
    }

    #[test]
    fn test_strip_base() {
        let uri: Uri = "/talks/deck/index.html?x=1".parse().unwrap();
        assert_eq!(
            strip_base(&uri, "/talks/").unwrap(),
            "/deck/index.html?x=1"
        );
        let uri: Uri = "/other/deck".parse().unwrap();
        assert!(strip_base(&uri, "/talks/").is_none());
    }

    #[test]
    fn test_render_index_escapes_names() {
        let markup = render_index(&["<script>".to_string()]).into_string();
        assert!(markup.contains("&lt;script&gt;"));
        assert!(markup.contains(r#"href="%3Cscript%3E/""#));
        assert!(!markup.contains("<script>"));
    }

    #[tokio::test]
    async fn test_index_lists_presentations() {
        let (status, body) = get("/", "/", |dir| {
            std::fs::create_dir(dir.join("keynote")).unwrap();
            std::fs::create_dir(dir.join("my talk")).unwrap();
        })
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"href="keynote/""#));
        assert!(body.contains(r#"href="my%20talk/""#));
        assert!(body.find("keynote") < body.find("my talk"));
    }

    #[tokio::test]
    async fn test_index_missing_directory_is_500() {
        let (status, _) = get("/", "/", |dir| {
            std::fs::remove_dir_all(dir).unwrap();
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_serves_files_under_base_path() {
        let (status, body) = get("/talks/", "/talks/keynote/index.html", |dir| {
            std::fs::create_dir(dir.join("keynote")).unwrap();
            std::fs::write(dir.join("keynote/index.html"), "<h1>slides</h1>").unwrap();
        })
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>slides</h1>");
    }

    #[tokio::test]
    async fn test_outside_base_path_is_404() {
        let (status, _) = get("/talks/", "/keynote/index.html", |dir| {
            std::fs::create_dir(dir.join("keynote")).unwrap();
            std::fs::write(dir.join("keynote/index.html"), "x").unwrap();
        })
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
