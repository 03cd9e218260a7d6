use axum::body::Body;
use eyre::Result;
use hyper::{Request, Response, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;

use crate::ports::http_client::{OriginClient, OriginClientError, OriginClientResult};

/// Origin client adapter using Hyper with Rustls (HTTP/1.1, plain or TLS).
///
/// Responsibilities:
/// * Derives the outbound `Host` header from the target URI
/// * Pins the request version to HTTP/1.1
/// * Converts between Hyper body and Axum body types
///
/// The adapter never follows redirects (Hyper's client doesn't) and applies
/// no deadline of its own; both are owned by the engine, which needs to see
/// 3xx responses and to cancel individual attempts.
pub struct OriginClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl OriginClientAdapter {
    /// Create a new origin client adapter.
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, Body>(https_connector);

        tracing::info!("Created origin HTTP client (HTTP/1.1, rustls)");
        Ok(Self { client })
    }
}

impl Default for OriginClientAdapter {
    fn default() -> Self {
        Self::new().expect("Failed to create origin HTTP client")
    }
}

#[async_trait::async_trait]
impl OriginClient for OriginClientAdapter {
    async fn forward(&self, req: Request<Body>) -> OriginClientResult<Response<Body>> {
        let client = self.client.clone();

        // Engines sanitize the inbound Host away; the correct one for this
        // leg comes from the target URI.
        let Some(host) = req.uri().host() else {
            tracing::error!("Outgoing URI has no host: {}", req.uri());
            return Err(OriginClientError::InvalidRequest(
                "Outgoing URI has no host".to_string(),
            ));
        };

        let host_header_val = if let Some(port) = req.uri().port() {
            HeaderValue::from_str(&format!("{host}:{}", port.as_u16()))
        } else {
            HeaderValue::from_str(host)
        }
        .map_err(|e| OriginClientError::InvalidRequest(format!("Invalid host header: {e}")))?;

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        parts.headers.insert(header::HOST, host_header_val);

        let outgoing_request = Request::from_parts(parts, body);

        let method_for_error_log = outgoing_request.method().clone();
        let uri_for_error_log = outgoing_request.uri().clone();

        tracing::debug!(
            "Forwarding {} {} to origin",
            method_for_error_log,
            uri_for_error_log
        );

        match client.request(outgoing_request).await {
            Ok(response) => {
                let (parts, hyper_body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(hyper_body)))
            }
            Err(e) => {
                tracing::error!(
                    "Error forwarding {} {} to origin: {}",
                    method_for_error_log,
                    uri_for_error_log,
                    e
                );
                Err(OriginClientError::ConnectionError(format!(
                    "Request to {method_for_error_log} {uri_for_error_log} failed: {e}"
                )))
            }
        }
    }
}
