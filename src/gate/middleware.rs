//! Request gate middleware.
//!
//! Runs once per inbound request, ahead of every handler. Classified
//! requests are charged against their client's budget in the counter store;
//! everything else passes through without touching the store, keeping the
//! hot path free of lock traffic.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use tracing::{debug, warn};

use super::classify::{client_addr, client_key, RoutePolicy};
use crate::ratelimit::RateLimitStore;

/// Localized message returned with every rejection.
const LIMIT_MESSAGE: &str = "Çok fazla istek gönderdiniz. Lütfen daha sonra tekrar deneyin.";

/// Shared state for the gate middleware.
///
/// The store is constructed by the process entry point and injected here,
/// so tests can run an isolated store per router.
pub struct GateState {
    pub store: Arc<RateLimitStore>,
    pub policy: RoutePolicy,
    /// Advertised retry interval, matching the window duration
    pub retry_after_secs: u64,
}

/// Admit or reject one request.
///
/// A rejection is final for that attempt: the gate never retries, and the
/// budget already charged is not refunded if a later stage fails.
pub async fn rate_limit_gate(
    State(state): State<Arc<GateState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(class) = state
        .policy
        .classify(request.uri().path(), request.method())
    else {
        return next.run(request).await;
    };

    let addr = client_addr(request.headers());
    let key = client_key(class, &addr);
    let budget = state.policy.budget(class);

    if state.store.check_and_record(&key, budget) {
        warn!(
            class = %class,
            client = %addr,
            budget,
            path = %request.uri().path(),
            "Rate limit exceeded"
        );
        return too_many_requests(state.retry_after_secs);
    }

    debug!(class = %class, client = %addr, "Request admitted");
    next.run(request).await
}

/// Standardized throttling response: `429`, a retry hint matching the
/// window, and a localized JSON error body.
fn too_many_requests(retry_after_secs: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after_secs.to_string())],
        Json(serde_json::json!({ "error": LIMIT_MESSAGE })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::{middleware, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    fn gate_state(store: Arc<RateLimitStore>) -> Arc<GateState> {
        Arc::new(GateState {
            store,
            policy: RoutePolicy::default(),
            retry_after_secs: 60,
        })
    }

    fn gated_router(store: Arc<RateLimitStore>) -> Router {
        Router::new()
            .fallback(|| async { "ok" })
            .layer(middleware::from_fn_with_state(
                gate_state(store),
                rate_limit_gate,
            ))
    }

    fn default_store() -> Arc<RateLimitStore> {
        Arc::new(RateLimitStore::new(
            Duration::from_secs(60),
            Duration::from_secs(30),
            10_000,
        ))
    }

    async fn send(router: &Router, method: &str, path: &str, ip: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap();
        router.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn auth_budget_admits_five_then_rejects() {
        let router = gated_router(default_store());

        for _ in 0..5 {
            let response = send(&router, "POST", "/api/auth/login", "1.2.3.4").await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&router, "POST", "/api/auth/login", "1.2.3.4").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn rejection_carries_retry_hint_and_json_body() {
        let router = gated_router(default_store());

        for _ in 0..3 {
            send(&router, "POST", "/sifremi-unuttum", "1.2.3.4").await;
        }
        let response = send(&router, "POST", "/sifremi-unuttum", "1.2.3.4").await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "60"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("fazla istek"));
    }

    #[tokio::test]
    async fn distinct_clients_have_independent_budgets() {
        let router = gated_router(default_store());

        for _ in 0..5 {
            send(&router, "POST", "/giris", "1.2.3.4").await;
        }
        let response = send(&router, "POST", "/giris", "1.2.3.4").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = send(&router, "POST", "/giris", "5.6.7.8").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unclassified_paths_never_consult_the_store() {
        let store = default_store();
        let router = gated_router(Arc::clone(&store));

        for _ in 0..100 {
            let response = send(&router, "GET", "/makale/kara-delikler", "1.2.3.4").await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test]
    async fn missing_identity_shares_the_unknown_bucket() {
        let router = gated_router(default_store());

        for _ in 0..5 {
            let request = Request::builder()
                .method("POST")
                .uri("/kayit")
                .body(Body::empty())
                .unwrap();
            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        // Another header-less client lands in the same bucket.
        let request = Request::builder()
            .method("POST")
            .uri("/kayit")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn api_class_uses_its_own_budget() {
        let store = default_store();
        let router = gated_router(Arc::clone(&store));

        for _ in 0..30 {
            let response = send(&router, "GET", "/api/konular", "1.2.3.4").await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = send(&router, "GET", "/api/konular", "1.2.3.4").await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // The auth budget for the same address is untouched.
        let response = send(&router, "POST", "/giris", "1.2.3.4").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
