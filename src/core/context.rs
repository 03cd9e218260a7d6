use std::collections::HashSet;

use axum::body::Body;
use bytes::Bytes;
use http::{HeaderMap, Method, Request};
use http_body_util::BodyExt;
use url::Url;

use crate::core::{attempt::AttemptError, origin::Origin};

/// Body replayed across forwarding attempts.
///
/// Bodies of non-GET/HEAD requests are fully buffered before the first
/// attempt so that a failed attempt can be retried against a different
/// origin without re-reading a consumed stream.
#[derive(Debug, Clone)]
enum ForwardBody {
    Empty,
    Buffered(Bytes),
}

/// Request-scoped state for one pass through the failover engine.
///
/// Holds the immutable inbound snapshot (method, headers, path+query,
/// buffered body), the serving URL used for self-proxy exclusion and
/// Location rewriting, and the mutable attempt bookkeeping: the set of
/// already-attempted origin URLs (grows monotonically, never shrinks) and
/// the last observed failure. Created at request start, dropped when the
/// response is returned; it never outlives or escapes its request.
pub struct RequestContext {
    method: Method,
    headers: HeaderMap,
    path_and_query: String,
    body: ForwardBody,
    serving_url: Url,
    request_id: String,
    attempted: HashSet<String>,
    last_failure: Option<AttemptError>,
}

impl RequestContext {
    /// Snapshot an inbound request, buffering the body for replay when the
    /// method can carry one.
    ///
    /// # Errors
    /// Fails only when reading the inbound body stream fails.
    pub async fn from_request(
        request: Request<Body>,
        serving_url: Url,
        request_id: String,
    ) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

        let body = if parts.method == Method::GET || parts.method == Method::HEAD {
            ForwardBody::Empty
        } else {
            let collected = body.collect().await?;
            ForwardBody::Buffered(collected.to_bytes())
        };

        Ok(Self {
            method: parts.method,
            headers: parts.headers,
            path_and_query,
            body,
            serving_url,
            request_id,
            attempted: HashSet::new(),
            last_failure: None,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw inbound header snapshot; sanitation happens per attempt.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    /// Scheme/host/port the client addressed; used for Location rewriting.
    pub fn serving_url(&self) -> &Url {
        &self.serving_url
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// A fresh body for one forwarding attempt. Buffered bodies are cheap
    /// to replay (`Bytes` clone shares the allocation).
    pub fn body_for_attempt(&self) -> Body {
        match &self.body {
            ForwardBody::Empty => Body::empty(),
            ForwardBody::Buffered(bytes) => Body::from(bytes.clone()),
        }
    }

    /// Record that an origin has been attempted for this request. Attempted
    /// origins are never reselected.
    pub fn mark_attempted(&mut self, origin: &Origin) {
        self.attempted.insert(origin.url().to_string());
    }

    pub fn is_attempted(&self, origin: &Origin) -> bool {
        self.attempted.contains(origin.url().as_str())
    }

    pub fn attempted_count(&self) -> usize {
        self.attempted.len()
    }

    /// Keep the most recent failure for diagnostic reporting.
    pub fn record_failure(&mut self, failure: AttemptError) {
        self.last_failure = Some(failure);
    }

    pub fn last_failure(&self) -> Option<&AttemptError> {
        self.last_failure.as_ref()
    }

    /// Human-readable description of the last failure, for the aggregate
    /// error payload.
    pub fn last_failure_text(&self) -> String {
        self.last_failure
            .as_ref()
            .map_or_else(|| "no attempt failures recorded".to_string(), ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serving() -> Url {
        Url::parse("http://lb.example.com").unwrap()
    }

    #[tokio::test]
    async fn test_get_request_body_stays_empty() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("http://lb.example.com/api?x=1")
            .body(Body::from("ignored for GET"))
            .unwrap();

        let ctx = RequestContext::from_request(request, serving(), "req-1".to_string())
            .await
            .unwrap();
        assert_eq!(ctx.path_and_query(), "/api?x=1");
        assert!(matches!(ctx.body, ForwardBody::Empty));
    }

    #[tokio::test]
    async fn test_post_body_is_buffered_and_replayable() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("http://lb.example.com/submit")
            .body(Body::from("payload"))
            .unwrap();

        let ctx = RequestContext::from_request(request, serving(), "req-2".to_string())
            .await
            .unwrap();

        for _ in 0..2 {
            let body = ctx.body_for_attempt();
            let bytes = body.collect().await.unwrap().to_bytes();
            assert_eq!(&bytes[..], b"payload");
        }
    }

    #[tokio::test]
    async fn test_attempted_set_grows_monotonically() {
        let request = Request::builder()
            .uri("http://lb.example.com/")
            .body(Body::empty())
            .unwrap();
        let mut ctx = RequestContext::from_request(request, serving(), "req-3".to_string())
            .await
            .unwrap();

        let origin: Origin = "http://server1.example.com".parse().unwrap();
        assert!(!ctx.is_attempted(&origin));

        ctx.mark_attempted(&origin);
        assert!(ctx.is_attempted(&origin));
        assert_eq!(ctx.attempted_count(), 1);

        // Marking twice does not inflate the count.
        ctx.mark_attempted(&origin);
        assert_eq!(ctx.attempted_count(), 1);
    }
}
