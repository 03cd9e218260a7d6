use std::sync::Arc;

use axum::{
    body::Body,
    http::{StatusCode, header},
};
use eyre::{Result, WrapErr};
use hyper::{Request, Response};
use url::Url;
use uuid::Uuid;

use crate::{
    config::ProxyConfig,
    core::{
        AttemptExecutor, FailoverDriver, Origin, OriginPools, ProxyError, RequestContext,
    },
    ports::http_client::OriginClient,
};

/// HTTP handler for the Keel load balancer.
///
/// Routes the two read-only introspection paths to local reporters and
/// everything else through the failover engine. This adapter owns the
/// boundary policy: how engine failures serialize into client-facing JSON.
pub struct HttpHandler {
    config: Arc<ProxyConfig>,
    origins: Vec<Arc<Origin>>,
    driver: FailoverDriver,
}

impl HttpHandler {
    pub fn new(config: Arc<ProxyConfig>, http_client: Arc<dyn OriginClient>) -> Self {
        let origins = Self::collect_origins(&config);
        let driver = FailoverDriver::new(AttemptExecutor::new(
            http_client,
            config.inject_headers.clone(),
        ));
        Self {
            config,
            origins,
            driver,
        }
    }

    /// Build validated origins from the configuration, excluding entries
    /// whose URL fails to parse. Exclusion is logged, never fatal; the
    /// validator reports these at startup.
    pub fn collect_origins(config: &ProxyConfig) -> Vec<Arc<Origin>> {
        config
            .origins
            .iter()
            .filter_map(|entry| match Origin::from_config(entry) {
                Ok(origin) => Some(Arc::new(origin)),
                Err(e) => {
                    tracing::error!("Excluding invalid origin: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Main request handler that routes requests appropriately
    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, eyre::Error> {
        let path = req.uri().path();

        if path == self.config.health_path {
            return self.handle_health();
        }
        if path == self.config.stats_path {
            return self.handle_stats();
        }
        self.handle_proxy_request(req).await
    }

    /// Handle the read-only health endpoint
    fn handle_health(&self) -> Result<Response<Body>, eyre::Error> {
        let enabled = self.config.origins.iter().filter(|o| o.enabled).count();
        let total = self.config.origins.len();

        let status = if enabled > 0 {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        let health_data = serde_json::json!({
            "status": if enabled > 0 { "ok" } else { "degraded" },
            "origins": {
                "enabled": enabled,
                "total": total
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        let response = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(health_data.to_string()))
            .wrap_err("Failed to build health check response")?;

        Ok(response)
    }

    /// Handle the read-only stats endpoint
    fn handle_stats(&self) -> Result<Response<Body>, eyre::Error> {
        let origins: Vec<_> = self
            .config
            .origins
            .iter()
            .map(|o| {
                serde_json::json!({
                    "url": o.url,
                    "weight": o.weight,
                    "enabled": o.enabled,
                    "backup": o.backup,
                    "timeout_millis": o.timeout_millis,
                })
            })
            .collect();

        let stats_data = serde_json::json!({
            "service": "Keel Load Balancer",
            "version": env!("CARGO_PKG_VERSION"),
            "listen_addr": &self.config.listen_addr,
            "origins": origins,
            "enabled_origins": self.config.origins.iter().filter(|o| o.enabled).count(),
            "primary_origins": self.config.origins.iter().filter(|o| o.enabled && !o.backup).count(),
            "backup_origins": self.config.origins.iter().filter(|o| o.enabled && o.backup).count(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(stats_data.to_string()))
            .wrap_err("Failed to build stats response")?;

        Ok(response)
    }

    /// Forward a request through the failover engine
    async fn handle_proxy_request(
        &self,
        req: Request<Body>,
    ) -> Result<Response<Body>, eyre::Error> {
        let request_id = Uuid::new_v4().to_string();
        let serving_url = self.serving_url(&req);
        let serving_host = serving_url.host_str().unwrap_or("").to_string();

        tracing::info!(
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            "handling request"
        );

        // Pools are request-scoped views: the serving hostname is only
        // known here, so eligibility is re-derived every time.
        let pools = OriginPools::partition(&self.origins, &serving_host);

        let mut ctx = RequestContext::from_request(req, serving_url, request_id)
            .await
            .wrap_err("Failed to buffer inbound request body")?;

        match self.driver.run(&pools, &mut ctx).await {
            Ok(response) => Ok(response),
            Err(error) => self.failure_response(&error, &ctx),
        }
    }

    /// The scheme/host/port the client addressed, from the Host header
    /// with URI-authority and listen-address fallbacks. The listener only
    /// speaks plain HTTP, so the scheme is fixed.
    fn serving_url(&self, req: &Request<Body>) -> Url {
        let authority = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().authority().map(|a| a.to_string()))
            .unwrap_or_else(|| self.config.listen_addr.clone());

        Url::parse(&format!("http://{authority}"))
            .or_else(|_| Url::parse(&format!("http://{}", self.config.listen_addr)))
            .unwrap_or_else(|_| Url::parse("http://localhost").expect("static URL parses"))
    }

    /// Serialize a terminal engine failure into the client-facing JSON
    /// error response.
    fn failure_response(
        &self,
        error: &ProxyError,
        ctx: &RequestContext,
    ) -> Result<Response<Body>, eyre::Error> {
        let payload = match error {
            ProxyError::NoEligibleOrigins => serde_json::json!({
                "error": error.category(),
                "message": "No origins available",
                "request_id": ctx.request_id(),
            }),
            ProxyError::AllOriginsExhausted {
                attempted,
                last_failure,
            } => serde_json::json!({
                "error": error.category(),
                "message": "All origins failed",
                "request_id": ctx.request_id(),
                "attempted_origins": attempted,
                "last_error": last_failure,
            }),
        };

        let response = Response::builder()
            .status(error.status())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .wrap_err("Failed to build failure response")?;

        Ok(response)
    }
}
