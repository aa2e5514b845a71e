use crate::device;
use crate::relay::RelayError;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, info};

pub async fn subscription_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let client_ip = get_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    let descriptor = device::parse_device(&headers);

    // The token is a credential, never log it whole.
    let token_prefix: String = token.chars().take(20).collect();
    info!(
        token = %token_prefix,
        ip = %client_ip,
        device = descriptor.device_name.unwrap_or("unknown"),
        os = descriptor.os_version.as_deref().unwrap_or("-"),
        "subscription fetch"
    );

    match state.relay.relay(&token, &descriptor.user_agent).await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(header::CONTENT_TYPE, upstream.content_type)],
                upstream.body,
            )
                .into_response()
        }
        Err(RelayError::Timeout) => {
            error!(token = %token_prefix, "Upstream timed out");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
        }
        Err(RelayError::Unreachable(reason)) => {
            error!(token = %token_prefix, %reason, "Upstream unreachable");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
        }
    }
}

fn get_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(ip) = headers.get("cf-connecting-ip") {
        return ip.to_str().ok().map(|s| s.to_string());
    }
    if let Some(ip) = headers.get("x-forwarded-for") {
        return ip
            .to_str()
            .ok()
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::SubscriptionRelay;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn spawn_upstream(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn app_for(addr: SocketAddr, timeout: Duration) -> Router {
        let state = AppState {
            relay: SubscriptionRelay::new(format!("http://{}", addr), true, timeout),
        };
        Router::new()
            .route("/sub/{token}", get(subscription_handler))
            .with_state(state)
    }

    #[tokio::test]
    async fn upstream_status_and_body_pass_through() {
        let upstream = Router::new().route(
            "/sub/{token}",
            get(|| async {
                (
                    StatusCode::GONE,
                    [(header::CONTENT_TYPE, "text/plain")],
                    "expired",
                )
            }),
        );
        let addr = spawn_upstream(upstream).await;
        let app = app_for(addr, Duration::from_secs(5));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/sub/some-token")
                    .header("user-agent", "Happ/3.7.0/ios")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"expired");
    }

    #[tokio::test]
    async fn relay_failure_maps_to_generic_500() {
        let upstream = Router::new().route(
            "/sub/{token}",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let addr = spawn_upstream(upstream).await;
        let app = app_for(addr, Duration::from_millis(200));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/sub/whatever")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Error");
    }

    #[test]
    fn client_ip_prefers_cf_header_and_splits_forwarded_list() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 172.16.0.1".parse().unwrap());
        assert_eq!(get_client_ip(&headers).as_deref(), Some("10.0.0.1"));

        headers.insert("cf-connecting-ip", "203.0.113.9".parse().unwrap());
        assert_eq!(get_client_ip(&headers).as_deref(), Some("203.0.113.9"));

        assert_eq!(get_client_ip(&HeaderMap::new()), None);
    }
}
