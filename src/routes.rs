//! Route definitions for the FlightSurety oracle server

use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::handlers::*;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api", get(api_root))
}

pub fn oracle_routes() -> Router<AppState> {
    Router::new().route("/api/oracles", get(list_oracles))
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .merge(oracle_routes())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::models::{Address, Oracle};
    use crate::services::OraclePool;

    async fn get_json(app: Router, uri: &str) -> Value {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn api_returns_static_payload() {
        let body = get_json(app(AppState::new()), "/api").await;
        assert_eq!(body["message"], "An API for use with your Dapp!");
    }

    #[tokio::test]
    async fn health_is_plain_ok() {
        let response = app(AppState::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn oracles_endpoint_lists_published_pool() {
        let state = AppState::new();
        let empty = get_json(app(state.clone()), "/api/oracles").await;
        assert_eq!(empty["data"], serde_json::json!([]));

        state
            .set_oracle_pool(OraclePool::new(vec![Oracle::new(Address([7; 20]), [1, 4, 8])]))
            .await;
        let body = get_json(app(state), "/api/oracles").await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["indexes"], serde_json::json!([1, 4, 8]));
        assert_eq!(body["data"][0]["account"], format!("0x{}", "07".repeat(20)));
    }
}
