//! Forwarding admitted requests to the upstream application.
//!
//! The gate owns no application behavior: once a request is admitted it is
//! replayed against the configured upstream base URL and the upstream's
//! answer is relayed back unchanged. No rate-limit state travels with it.

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Connection-level headers that must not be relayed across the hop.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Largest request body the gate will buffer before forwarding.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for one round trip to the upstream application.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to the upstream application's base URL.
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
}

impl Upstream {
    /// Create a client for the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Replay a request against the upstream and relay the answer.
    pub async fn forward(&self, request: Request) -> Result<Response> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        ensure_request_id(&mut parts.headers);
        let headers = relayed_headers(&parts.headers);

        debug!(method = %parts.method, url = %url, "Forwarding request upstream");

        let body = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;
        let upstream_response = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let mut builder = Response::builder().status(upstream_response.status());
        for (name, value) in relayed_headers(upstream_response.headers()).iter() {
            builder = builder.header(name, value);
        }

        let bytes = upstream_response.bytes().await?;
        Ok(builder.body(Body::from(bytes))?)
    }
}

/// Copy all headers except the hop-by-hop set.
fn relayed_headers(headers: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name) {
            relayed.append(name.clone(), value.clone());
        }
    }
    relayed
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| name.as_str().eq_ignore_ascii_case(hop))
}

/// Attach a correlation id when the trusted proxy did not supply one.
fn ensure_request_id(headers: &mut HeaderMap) {
    if headers.contains_key("x-request-id") {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
        headers.insert("x-request-id", value);
    }
}
