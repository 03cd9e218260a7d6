use std::sync::Arc;

use axum::body::Body;
use http::{Response, StatusCode};
use thiserror::Error;

use crate::core::{
    attempt::AttemptExecutor, context::RequestContext, origin::Origin, registry::OriginPools,
    selector::WeightedSelector,
};

/// Terminal engine failures surfaced to the entry-point adapter.
///
/// Per-attempt failures never escape the driver; only the two conditions a
/// caller must map to a client-facing error do. The engine contract never
/// terminates abnormally for expected operational failures — it always
/// returns a defined result value.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    /// Both pools were empty before any attempt: every origin is disabled,
    /// self-referential, or absent
    #[error("no eligible origins for this request")]
    NoEligibleOrigins,

    /// Every eligible origin in both pools was attempted and failed
    #[error("all origins failed after {attempted} attempts; last failure: {last_failure}")]
    AllOriginsExhausted {
        /// Number of origins attempted for this request
        attempted: usize,
        /// Description of the terminal failure
        last_failure: String,
    },
}

impl ProxyError {
    /// HTTP status the boundary layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoEligibleOrigins => StatusCode::SERVICE_UNAVAILABLE,
            Self::AllOriginsExhausted { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Machine-readable error category tag for failure payloads.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NoEligibleOrigins => "Service Unavailable",
            Self::AllOriginsExhausted { .. } => "Bad Gateway",
        }
    }
}

/// Drives forwarding attempts across the primary pool, then the backup
/// pool, until one succeeds or both are exhausted.
///
/// Within a pool, each round selects weighted-randomly among the origins
/// not yet attempted for this request, so every origin is attempted at
/// most once and the driver terminates after at most
/// `primary.len() + backup.len()` attempts. Attempts are strictly
/// sequential; one attempt completes (or times out) before the next
/// begins.
pub struct FailoverDriver {
    executor: AttemptExecutor,
}

impl FailoverDriver {
    pub fn new(executor: AttemptExecutor) -> Self {
        Self { executor }
    }

    /// Run the failover loop for one request.
    ///
    /// Returns the first successful (transformed) origin response, or a
    /// [`ProxyError`] when no origin could serve the request. An empty pool
    /// is not an error; the driver moves straight to the next one.
    pub async fn run(
        &self,
        pools: &OriginPools,
        ctx: &mut RequestContext,
    ) -> Result<Response<Body>, ProxyError> {
        if pools.is_empty() {
            return Err(ProxyError::NoEligibleOrigins);
        }

        for pool in [&pools.primary, &pools.backup] {
            loop {
                let remaining: Vec<Arc<Origin>> = pool
                    .iter()
                    .filter(|origin| !ctx.is_attempted(origin))
                    .cloned()
                    .collect();

                // The RNG stays inside this block: ThreadRng must not be
                // held across the attempt's await.
                let selected = {
                    let mut rng = rand::rng();
                    WeightedSelector::select(&remaining, &mut rng)
                };
                let Some(origin) = selected else { break };

                ctx.mark_attempted(&origin);

                match self.executor.attempt(&origin, ctx).await {
                    Ok(response) => {
                        tracing::debug!(
                            origin = %origin,
                            status = %response.status(),
                            request_id = %ctx.request_id(),
                            "origin answered"
                        );
                        return Ok(response);
                    }
                    Err(failure) => {
                        tracing::warn!(
                            origin = %origin,
                            error = %failure,
                            request_id = %ctx.request_id(),
                            "attempt failed, failing over"
                        );
                        ctx.record_failure(failure);
                    }
                }
            }
        }

        Err(ProxyError::AllOriginsExhausted {
            attempted: ctx.attempted_count(),
            last_failure: ctx.last_failure_text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use async_trait::async_trait;
    use http::Request;

    use super::*;
    use crate::{
        config::OriginConfig,
        ports::http_client::{OriginClient, OriginClientError, OriginClientResult},
    };

    /// Answers 200 for hosts in `ok_hosts`, refuses everything else, and
    /// records the order hosts were contacted in.
    struct HostScriptedClient {
        ok_hosts: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl HostScriptedClient {
        fn new(ok_hosts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                ok_hosts: ok_hosts.iter().map(|h| h.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OriginClient for HostScriptedClient {
        async fn forward(&self, req: Request<Body>) -> OriginClientResult<Response<Body>> {
            let host = req.uri().host().unwrap_or("").to_string();
            self.calls.lock().unwrap().push(host.clone());
            if self.ok_hosts.contains(&host) {
                Ok(Response::builder().status(200).body(Body::empty()).unwrap())
            } else {
                Err(OriginClientError::ConnectionError(format!(
                    "connection to {host} refused"
                )))
            }
        }
    }

    fn driver_for(client: Arc<HostScriptedClient>) -> FailoverDriver {
        FailoverDriver::new(AttemptExecutor::new(client, HashMap::new()))
    }

    fn pools_from(configs: &[OriginConfig]) -> OriginPools {
        let origins: Vec<Arc<Origin>> = configs
            .iter()
            .map(|c| Arc::new(Origin::from_config(c).unwrap()))
            .collect();
        OriginPools::partition(&origins, "lb.example.com")
    }

    async fn fresh_context() -> RequestContext {
        let request = Request::builder()
            .uri("http://lb.example.com/resource")
            .body(Body::empty())
            .unwrap();
        let serving = url::Url::parse("http://lb.example.com").unwrap();
        RequestContext::from_request(request, serving, "req-test".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_pools_fail_fast_without_attempts() {
        let client = HostScriptedClient::new(&[]);
        let driver = driver_for(client.clone());
        let pools =
            pools_from(&[OriginConfig::new("http://server1.example.com").with_enabled(false)]);
        let mut ctx = fresh_context().await;

        let err = driver.run(&pools, &mut ctx).await.unwrap_err();
        assert!(matches!(err, ProxyError::NoEligibleOrigins));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_first_success_stops_the_loop() {
        let client = HostScriptedClient::new(&["server1.example.com"]);
        let driver = driver_for(client.clone());
        let pools = pools_from(&[OriginConfig::new("http://server1.example.com")]);
        let mut ctx = fresh_context().await;

        let response = driver.run(&pools, &mut ctx).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(ctx.attempted_count(), 1);
        assert_eq!(client.calls(), vec!["server1.example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempt_count_and_last_failure() {
        let client = HostScriptedClient::new(&[]);
        let driver = driver_for(client.clone());
        let pools = pools_from(&[
            OriginConfig::new("http://server1.example.com"),
            OriginConfig::new("http://server2.example.com"),
            OriginConfig::new("http://backup1.example.com").with_backup(true),
        ]);
        let mut ctx = fresh_context().await;

        let err = driver.run(&pools, &mut ctx).await.unwrap_err();
        match &err {
            ProxyError::AllOriginsExhausted {
                attempted,
                last_failure,
            } => {
                assert_eq!(*attempted, 3);
                assert!(last_failure.contains("refused"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.category(), "Bad Gateway");
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_backup_pool_only_after_primary_exhausted() {
        let client = HostScriptedClient::new(&["backup1.example.com"]);
        let driver = driver_for(client.clone());
        let pools = pools_from(&[
            OriginConfig::new("http://server1.example.com"),
            OriginConfig::new("http://server2.example.com"),
            OriginConfig::new("http://backup1.example.com").with_backup(true),
        ]);
        let mut ctx = fresh_context().await;

        let response = driver.run(&pools, &mut ctx).await.unwrap();
        assert_eq!(response.status(), 200);

        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2], "backup1.example.com");
        assert!(calls[..2].iter().all(|h| h.starts_with("server")));
    }
}
