//! Header hygiene at the proxy boundary.
//!
//! Hop-by-hop headers are meaningful for one transport leg only; forwarding
//! them corrupts framing between proxy and origin (request side) or between
//! proxy and client (response side). `Set-Cookie` needs special handling:
//! header maps coalesce same-named values on overwrite, so cookies are
//! stripped generically and re-appended one instance at a time.
use http::{HeaderMap, HeaderValue, Response, header};
use url::Url;

/// Request headers never forwarded to an origin. `host` is included: the
/// outbound client derives the correct `Host` from the target URI.
const STRIP_REQUEST_HEADERS: [&str; 8] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "host",
];

/// Response headers never forwarded back to the client.
const STRIP_RESPONSE_HEADERS: [&str; 7] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Rewrites an origin response before it reaches the client: strips
/// hop-by-hop headers, re-attaches every `Set-Cookie` instance, and
/// rewrites a same-host `Location` to the proxy's serving identity.
pub struct ResponseTransformer;

impl ResponseTransformer {
    /// Transform an origin response into the client-facing response.
    ///
    /// Status and body pass through untouched; the body keeps streaming.
    pub fn transform<B>(response: Response<B>, serving_url: &Url, origin_url: &Url) -> Response<B> {
        let (mut parts, body) = response.into_parts();

        let mut headers = HeaderMap::with_capacity(parts.headers.len());
        for (name, value) in &parts.headers {
            if *name == header::SET_COOKIE || STRIP_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        // Re-append cookies individually to preserve multiplicity and exact
        // values; a single insert would coalesce them.
        for cookie in parts.headers.get_all(header::SET_COOKIE) {
            headers.append(header::SET_COOKIE, cookie.clone());
        }

        let location = headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if let Some(location) = location
            && let Some(rewritten) = rewrite_location(&location, serving_url, origin_url)
            && let Ok(value) = HeaderValue::from_str(&rewritten)
        {
            headers.insert(header::LOCATION, value);
        }

        parts.headers = headers;
        Response::from_parts(parts, body)
    }
}

/// Strip the hop-by-hop set from an inbound request's headers, returning
/// the sanitized copy forwarded to origins.
pub fn sanitize_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if STRIP_REQUEST_HEADERS.contains(&name.as_str()) {
            continue;
        }
        sanitized.append(name.clone(), value.clone());
    }
    sanitized
}

/// Rewrite a `Location` header value for the client.
///
/// The value is resolved relative to the origin URL, so relative redirects
/// work. When the resolved host equals the origin's host, scheme/host/port
/// are replaced with the serving URL's while path, query and fragment stay
/// untouched. Returns `None` when the value should pass through unmodified
/// (foreign host, or not parseable as a URL).
fn rewrite_location(location: &str, serving_url: &Url, origin_url: &Url) -> Option<String> {
    let resolved = origin_url.join(location).ok()?;
    if resolved.host_str() != origin_url.host_str() {
        return None;
    }

    let mut rewritten = resolved;
    rewritten.set_scheme(serving_url.scheme()).ok()?;
    rewritten.set_host(serving_url.host_str()).ok()?;
    rewritten.set_port(serving_url.port()).ok()?;
    Some(rewritten.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid URL")
    }

    fn transform_headers(response: http::response::Builder) -> HeaderMap {
        let response = response.body(()).unwrap();
        let transformed = ResponseTransformer::transform(
            response,
            &url("https://edge.example.com"),
            &url("https://origin.internal"),
        );
        transformed.headers().clone()
    }

    #[test]
    fn test_sanitize_request_headers_strips_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::HOST, HeaderValue::from_static("lb.example.com"));
        headers.insert(header::TE, HeaderValue::from_static("trailers"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        let sanitized = sanitize_request_headers(&headers);
        assert!(!sanitized.contains_key(header::CONNECTION));
        assert!(!sanitized.contains_key(header::HOST));
        assert!(!sanitized.contains_key(header::TE));
        assert!(!sanitized.contains_key(header::UPGRADE));
        assert_eq!(
            sanitized.get(header::ACCEPT).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_transform_strips_response_hop_by_hop() {
        let headers = transform_headers(
            Response::builder()
                .header(header::CONNECTION, "close")
                .header(header::TRANSFER_ENCODING, "chunked")
                .header("keep-alive", "timeout=5")
                .header(header::CONTENT_TYPE, "text/plain"),
        );

        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert!(!headers.contains_key("keep-alive"));
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn test_transform_preserves_set_cookie_multiplicity() {
        let headers = transform_headers(
            Response::builder()
                .header(header::SET_COOKIE, "session=abc; Path=/")
                .header(header::SET_COOKIE, "theme=dark; Path=/"),
        );

        let cookies: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.contains(&"session=abc; Path=/".to_string()));
        assert!(cookies.contains(&"theme=dark; Path=/".to_string()));
    }

    #[test]
    fn test_transform_rewrites_same_host_location() {
        let headers = transform_headers(
            Response::builder()
                .status(302)
                .header(header::LOCATION, "https://origin.internal/new"),
        );
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "https://edge.example.com/new"
        );
    }

    #[test]
    fn test_transform_rewrites_relative_location() {
        let headers = transform_headers(
            Response::builder()
                .status(302)
                .header(header::LOCATION, "/new?next=1"),
        );
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "https://edge.example.com/new?next=1"
        );
    }

    #[test]
    fn test_transform_passes_foreign_host_location_through() {
        let headers = transform_headers(
            Response::builder()
                .status(302)
                .header(header::LOCATION, "https://other-host.example/x"),
        );
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "https://other-host.example/x"
        );
    }

    #[test]
    fn test_transform_passes_unparseable_location_through() {
        let headers = transform_headers(
            Response::builder()
                .status(302)
                .header(header::LOCATION, "http://[not-a-url"),
        );
        assert_eq!(headers.get(header::LOCATION).unwrap(), "http://[not-a-url");
    }

    #[test]
    fn test_rewrite_location_replaces_port_and_scheme() {
        let rewritten = rewrite_location(
            "http://origin.internal:8080/path#frag",
            &url("http://edge.example.com:9000"),
            &url("http://origin.internal:8080"),
        )
        .unwrap();
        assert_eq!(rewritten, "http://edge.example.com:9000/path#frag");
    }
}
