use async_trait::async_trait;
use axum::body::Body;
use hyper::{Request, Response};
use thiserror::Error;

/// Custom error type for origin client operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OriginClientError {
    /// Error when the connection to an origin fails (refused, DNS, TLS,
    /// reset mid-stream)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error when the outgoing request cannot be constructed or sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for origin client operations
pub type OriginClientResult<T> = Result<T, OriginClientError>;

/// OriginClient defines the port (interface) for forwarding one HTTP
/// request to an origin server.
///
/// Contract for implementations:
/// * Redirects are never followed — the engine must see 3xx responses
///   itself to rewrite `Location`.
/// * No overall deadline is applied — the engine owns per-attempt timeouts
///   and cancels by dropping the returned future.
/// * The response body is returned as a stream, not collected.
#[async_trait]
pub trait OriginClient: Send + Sync + 'static {
    /// Forward a fully prepared request to the origin named by its URI.
    ///
    /// # Returns
    /// The origin's response (any status code, including errors) or a
    /// transport-level failure.
    async fn forward(&self, req: Request<Body>) -> OriginClientResult<Response<Body>>;
}
