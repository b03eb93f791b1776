//! Join-link construction.

use axum::http::HeaderMap;

/// Query parameter the follower page reads its multiplex id from.
pub const MULTIPLEX_QUERY_PARAM: &str = "remoteMultiplexId";

/// Public origin (`scheme://host`) the client reached us at, honouring
/// reverse-proxy headers.
pub fn request_origin(headers: &HeaderMap, https: bool) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or("localhost");
    let proto = header("x-forwarded-proto").unwrap_or(if https { "https" } else { "http" });
    format!("{proto}://{host}")
}

/// Ensure the path starts and ends with `/`.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim();
    let mut out = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('/') {
        out.push('/');
    }
    out.push_str(trimmed);
    if !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Link a phone opens to control the presentation.
pub fn remote_url(origin: &str, base_path: &str, remote_id: &str) -> String {
    format!("{origin}{base_path}_remote/ui/?{remote_id}")
}

/// The presentation's own URL with the multiplex id appended as a query
/// parameter. Any fragment is dropped; an existing query string is extended.
pub fn multiplex_url(share_url: &str, multiplex_id: &str) -> String {
    let without_fragment = share_url.split('#').next().unwrap_or_default();
    let separator = match without_fragment.find('?') {
        Some(pos) if pos > 0 => '&',
        _ => '?',
    };
    format!("{without_fragment}{separator}{MULTIPLEX_QUERY_PARAM}={multiplex_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn origin_from_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("talk.local:8080"));
        assert_eq!(request_origin(&headers, false), "http://talk.local:8080");
        assert_eq!(request_origin(&headers, true), "https://talk.local:8080");
    }

    #[test]
    fn origin_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("127.0.0.1:8080"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("slides.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(request_origin(&headers, false), "https://slides.example.com");
    }

    #[test]
    fn origin_without_headers() {
        assert_eq!(request_origin(&HeaderMap::new(), false), "http://localhost");
    }

    #[test]
    fn base_path_normalization() {
        assert_eq!(normalize_base_path("/"), "/");
        assert_eq!(normalize_base_path(""), "/");
        assert_eq!(normalize_base_path("talks"), "/talks/");
        assert_eq!(normalize_base_path("/talks"), "/talks/");
        assert_eq!(normalize_base_path("/talks/"), "/talks/");
    }

    #[test]
    fn remote_url_embeds_id() {
        assert_eq!(
            remote_url("https://h", "/talks/", "abc"),
            "https://h/talks/_remote/ui/?abc"
        );
    }

    #[test]
    fn multiplex_url_without_query() {
        assert_eq!(
            multiplex_url("http://h/deck/", "m1"),
            "http://h/deck/?remoteMultiplexId=m1"
        );
    }

    #[test]
    fn multiplex_url_with_query() {
        assert_eq!(
            multiplex_url("http://h/deck/?theme=dark", "m1"),
            "http://h/deck/?theme=dark&remoteMultiplexId=m1"
        );
    }

    #[test]
    fn multiplex_url_drops_fragment() {
        assert_eq!(
            multiplex_url("http://h/deck/?a=1#/3/2", "m1"),
            "http://h/deck/?a=1&remoteMultiplexId=m1"
        );
        assert_eq!(
            multiplex_url("http://h/deck/#/intro?x", "m1"),
            "http://h/deck/?remoteMultiplexId=m1"
        );
    }

    #[test]
    fn multiplex_url_leading_question_mark() {
        // A `?` at position 0 is not treated as an existing query string.
        assert_eq!(multiplex_url("?x=1", "m1"), "?x=1?remoteMultiplexId=m1");
    }
}
