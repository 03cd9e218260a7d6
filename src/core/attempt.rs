use std::{collections::HashMap, sync::Arc};

use axum::body::Body;
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, Uri};
use thiserror::Error;
use tokio::time::timeout;

use crate::{
    core::{
        context::RequestContext,
        origin::Origin,
        transform::{ResponseTransformer, sanitize_request_headers},
    },
    ports::http_client::OriginClient,
};

/// A single forwarding attempt's failure.
///
/// The engine does not distinguish failure causes for retry purposes — a
/// timeout, a refused connection and a broken stream all advance the
/// failover loop the same way. The variants exist for diagnostic text only.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AttemptError {
    /// Transport-level failure: connection refused, DNS, TLS, stream reset
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// No response header arrived within the origin's deadline
    #[error("origin {url} timed out after {timeout_millis}ms")]
    Timeout { url: String, timeout_millis: u128 },

    /// The target request could not be constructed
    #[error("could not build request for {url}: {message}")]
    InvalidTarget { url: String, message: String },
}

/// Performs one forwarding attempt against one chosen origin: builds the
/// target URL, sanitizes and injects headers, applies the per-origin
/// deadline, and hands the response to the [`ResponseTransformer`].
///
/// The executor is stateless across attempts; cancellation is attempt
/// scoped (dropping the timed-out future aborts only that attempt).
pub struct AttemptExecutor {
    client: Arc<dyn OriginClient>,
    inject_headers: HashMap<String, String>,
}

impl AttemptExecutor {
    /// Create an executor over an origin client and the globally injected
    /// header set (applied before per-origin headers).
    pub fn new(client: Arc<dyn OriginClient>, inject_headers: HashMap<String, String>) -> Self {
        Self {
            client,
            inject_headers,
        }
    }

    /// Forward the request described by `ctx` to `origin` once.
    ///
    /// Any received response, whatever its status code, is a success and is
    /// returned transformed; only transport failures and the deadline
    /// elapsing produce an error.
    pub async fn attempt(
        &self,
        origin: &Origin,
        ctx: &RequestContext,
    ) -> Result<Response<Body>, AttemptError> {
        let target = origin.target_for(ctx.path_and_query());
        let uri: Uri = target.parse().map_err(|e: http::uri::InvalidUri| {
            AttemptError::InvalidTarget {
                url: target.clone(),
                message: e.to_string(),
            }
        })?;

        let mut headers = sanitize_request_headers(ctx.headers());
        apply_injected_headers(&mut headers, &self.inject_headers);
        apply_injected_headers(&mut headers, origin.inject_headers());

        let mut request = Request::builder()
            .method(ctx.method().clone())
            .uri(uri)
            .body(ctx.body_for_attempt())
            .map_err(|e| AttemptError::InvalidTarget {
                url: target.clone(),
                message: e.to_string(),
            })?;
        *request.headers_mut() = headers;

        tracing::debug!(
            origin = %origin,
            target = %target,
            request_id = %ctx.request_id(),
            "forwarding attempt"
        );

        match timeout(origin.timeout(), self.client.forward(request)).await {
            Ok(Ok(response)) => Ok(ResponseTransformer::transform(
                response,
                ctx.serving_url(),
                origin.url(),
            )),
            Ok(Err(e)) => Err(AttemptError::Transport {
                url: origin.url().to_string(),
                message: e.to_string(),
            }),
            Err(_elapsed) => Err(AttemptError::Timeout {
                url: origin.url().to_string(),
                timeout_millis: origin.timeout().as_millis(),
            }),
        }
    }
}

/// Apply an injected header map, overriding any same-named header already
/// present. Entries with names or values the header map cannot represent
/// are skipped; the validator reports them at startup.
fn apply_injected_headers(headers: &mut HeaderMap, injected: &HashMap<String, String>) {
    for (name, value) in injected {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => {
                tracing::warn!(header = %name, "skipping injected header with invalid name or value");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http::Method;

    use super::*;
    use crate::{
        config::OriginConfig,
        ports::http_client::{OriginClientError, OriginClientResult},
    };

    /// Captures forwarded requests and answers 200 with an empty body.
    struct RecordingClient {
        captured: Mutex<Vec<(Method, Uri, HeaderMap)>>,
    }

    impl RecordingClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                captured: Mutex::new(Vec::new()),
            })
        }

        fn captured(&self) -> Vec<(Method, Uri, HeaderMap)> {
            self.captured.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OriginClient for RecordingClient {
        async fn forward(&self, req: Request<Body>) -> OriginClientResult<Response<Body>> {
            let (parts, _body) = req.into_parts();
            self.captured
                .lock()
                .unwrap()
                .push((parts.method, parts.uri, parts.headers));
            Ok(Response::builder().status(200).body(Body::empty()).unwrap())
        }
    }

    /// Never answers; used to exercise the deadline path.
    struct HangingClient;

    #[async_trait]
    impl OriginClient for HangingClient {
        async fn forward(&self, _req: Request<Body>) -> OriginClientResult<Response<Body>> {
            std::future::pending().await
        }
    }

    /// Always fails at the transport level.
    struct RefusingClient;

    #[async_trait]
    impl OriginClient for RefusingClient {
        async fn forward(&self, _req: Request<Body>) -> OriginClientResult<Response<Body>> {
            Err(OriginClientError::ConnectionError(
                "connection refused".to_string(),
            ))
        }
    }

    async fn context_for(request: Request<Body>) -> RequestContext {
        let serving = url::Url::parse("http://lb.example.com").unwrap();
        RequestContext::from_request(request, serving, "req-test".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_attempt_builds_target_and_strips_hop_by_hop() {
        let client = RecordingClient::new();
        let executor = AttemptExecutor::new(client.clone(), HashMap::new());
        let origin: Origin = "http://server1.example.com".parse().unwrap();

        let request = Request::builder()
            .method(Method::GET)
            .uri("http://lb.example.com/api/users?page=2")
            .header(http::header::CONNECTION, "keep-alive")
            .header(http::header::HOST, "lb.example.com")
            .header(http::header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();
        let ctx = context_for(request).await;

        let response = executor.attempt(&origin, &ctx).await.unwrap();
        assert_eq!(response.status(), 200);

        let captured = client.captured();
        assert_eq!(captured.len(), 1);
        let (method, uri, headers) = &captured[0];
        assert_eq!(method, &Method::GET);
        assert_eq!(
            uri.to_string(),
            "http://server1.example.com/api/users?page=2"
        );
        assert!(!headers.contains_key(http::header::CONNECTION));
        assert!(!headers.contains_key(http::header::HOST));
        assert_eq!(
            headers.get(http::header::ACCEPT).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_attempt_injected_header_layering() {
        let client = RecordingClient::new();
        let mut global = HashMap::new();
        global.insert("x-proxied-by".to_string(), "keel".to_string());
        global.insert("x-tier".to_string(), "global".to_string());
        let executor = AttemptExecutor::new(client.clone(), global);

        let mut config = OriginConfig::new("http://server1.example.com");
        config
            .headers
            .insert("x-tier".to_string(), "origin".to_string());
        let origin = Origin::from_config(&config).unwrap();

        let request = Request::builder()
            .uri("http://lb.example.com/")
            .header("x-tier", "inbound")
            .body(Body::empty())
            .unwrap();
        let ctx = context_for(request).await;

        executor.attempt(&origin, &ctx).await.unwrap();

        let captured = client.captured();
        let (_, _, headers) = &captured[0];
        // Per-origin beats global beats inbound.
        assert_eq!(headers.get("x-tier").unwrap(), "origin");
        assert_eq!(headers.get("x-proxied-by").unwrap(), "keel");
    }

    #[tokio::test]
    async fn test_attempt_times_out_after_origin_deadline() {
        let executor = AttemptExecutor::new(Arc::new(HangingClient), HashMap::new());

        let mut config = OriginConfig::new("http://slow.example.com");
        config.timeout_millis = 50;
        let origin = Origin::from_config(&config).unwrap();

        let request = Request::builder()
            .uri("http://lb.example.com/")
            .body(Body::empty())
            .unwrap();
        let ctx = context_for(request).await;

        let err = executor.attempt(&origin, &ctx).await.unwrap_err();
        assert!(matches!(err, AttemptError::Timeout { .. }));
        assert!(err.to_string().contains("timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_attempt_maps_transport_failure() {
        let executor = AttemptExecutor::new(Arc::new(RefusingClient), HashMap::new());
        let origin: Origin = "http://down.example.com".parse().unwrap();

        let request = Request::builder()
            .uri("http://lb.example.com/")
            .body(Body::empty())
            .unwrap();
        let ctx = context_for(request).await;

        let err = executor.attempt(&origin, &ctx).await.unwrap_err();
        assert!(matches!(err, AttemptError::Transport { .. }));
        assert!(err.to_string().contains("connection refused"));
    }
}
