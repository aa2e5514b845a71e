use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Verbatim capture of what the panel returned. The body is opaque to
/// this layer: it is a provisioning document consumed by the VPN client,
/// never parsed or re-encoded here.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
}

/// Stateless forwarder for subscription fetches. Constructed once at
/// startup and cloned into handler state.
#[derive(Debug, Clone)]
pub struct SubscriptionRelay {
    upstream_url: String,
    verify_tls: bool,
    timeout: Duration,
}

impl SubscriptionRelay {
    pub fn new(upstream_url: impl Into<String>, verify_tls: bool, timeout: Duration) -> Self {
        Self {
            upstream_url: upstream_url.into().trim_end_matches('/').to_string(),
            verify_tls,
            timeout,
        }
    }

    /// Forward a subscription fetch to the panel.
    ///
    /// The token is passed through opaquely. It is never decoded locally,
    /// so device descriptors cannot be linked to a panel account at this
    /// layer. Only the inbound User-Agent travels upstream; every other
    /// inbound header stays local.
    ///
    /// Non-2xx upstream statuses are not errors: the panel uses them to
    /// tell the client about expired or unknown subscriptions.
    pub async fn relay(
        &self,
        token: &str,
        user_agent: &str,
    ) -> Result<UpstreamResponse, RelayError> {
        // One short-lived client per call; TLS settings are fixed at startup.
        let client = Client::builder()
            .danger_accept_invalid_certs(!self.verify_tls)
            .timeout(self.timeout)
            .build()
            .map_err(|e| RelayError::Unreachable(e.to_string()))?;

        let url = format!("{}/sub/{}", self.upstream_url, token);
        debug!("Relaying subscription fetch to {}", url);

        let response = client
            .get(&url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/plain")
            .to_string();

        let body = response.bytes().await.map_err(classify_error)?.to_vec();

        Ok(UpstreamResponse {
            status,
            body,
            content_type,
        })
    }
}

fn classify_error(err: reqwest::Error) -> RelayError {
    if err.is_timeout() {
        RelayError::Timeout
    } else {
        warn!("Upstream call failed: {}", err);
        RelayError::Unreachable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Request;
    use axum::http::header;
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    async fn spawn_upstream(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn relay_to(addr: SocketAddr, timeout: Duration) -> SubscriptionRelay {
        SubscriptionRelay::new(format!("http://{}", addr), true, timeout)
    }

    #[tokio::test]
    async fn upstream_response_passes_through_verbatim() {
        let app = Router::new().route(
            "/sub/{token}",
            get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "ok") }),
        );
        let addr = spawn_upstream(app).await;

        let res = relay_to(addr, Duration::from_secs(5))
            .relay("any-token", "test-agent")
            .await
            .unwrap();

        assert_eq!(res.status, 200);
        assert_eq!(res.body, b"ok".to_vec());
        assert_eq!(res.content_type, "text/plain");
    }

    #[tokio::test]
    async fn non_2xx_statuses_are_not_errors() {
        let app = Router::new().route(
            "/sub/{token}",
            get(|| async { (axum::http::StatusCode::GONE, "expired") }),
        );
        let addr = spawn_upstream(app).await;

        let res = relay_to(addr, Duration::from_secs(5))
            .relay("stale-token", "test-agent")
            .await
            .unwrap();

        assert_eq!(res.status, 410);
        assert_eq!(res.body, b"expired".to_vec());
    }

    #[tokio::test]
    async fn slow_upstream_collapses_to_timeout() {
        let app = Router::new().route(
            "/sub/{token}",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let addr = spawn_upstream(app).await;

        let outcome = relay_to(addr, Duration::from_millis(200))
            .relay("any-token", "test-agent")
            .await;

        match outcome {
            Err(RelayError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn dead_upstream_collapses_to_unreachable() {
        // Bind then immediately drop the listener so the port is closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = relay_to(addr, Duration::from_secs(2))
            .relay("any-token", "test-agent")
            .await;

        match outcome {
            Err(RelayError::Unreachable(_)) => {}
            other => panic!("expected unreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn only_the_user_agent_reaches_upstream() {
        let seen = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/sub/{token}",
            get(move |req: Request| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = Some(req.headers().clone());
                    "ok"
                }
            }),
        );
        let addr = spawn_upstream(app).await;

        relay_to(addr, Duration::from_secs(5))
            .relay("any-token", "Happ/3.7.0")
            .await
            .unwrap();

        let headers = seen.lock().unwrap().clone().expect("upstream saw no request");
        assert_eq!(headers.get("user-agent").unwrap(), "Happ/3.7.0");
        assert!(headers.get("authorization").is_none());
        assert!(headers.get("cookie").is_none());
        assert!(headers.get("x-forwarded-for").is_none());
    }
}
