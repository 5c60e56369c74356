//! Integration tests for Search-Harvest
//!
//! These tests use wiremock to stand in for the remote search API and
//! exercise the HTTP client and the harvest loop end-to-end.

mod client_tests;
mod harvest_tests;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";

/// One search result in the remote's wire format
pub fn status_json(id: u64, text: &str) -> Value {
    json!({
        "id": id,
        "id_str": id.to_string(),
        "created_at": "Fri May 31 10:00:00 +0000 2024",
        "text": text,
        "user": {"screen_name": format!("user{}", id % 5), "geo_enabled": false},
        "coordinates": null
    })
}

/// A search response body holding `statuses`
pub fn page_json(statuses: Vec<Value>) -> Value {
    json!({
        "search_metadata": {"count": statuses.len()},
        "statuses": statuses
    })
}

/// A rate limit status body for the search endpoint
pub fn quota_json(remaining: i64, reset: i64) -> Value {
    json!({
        "rate_limit_context": {"access_token": "x"},
        "resources": {
            "search": {
                "/search/tweets": {"limit": 180, "remaining": remaining, "reset": reset}
            }
        }
    })
}

/// Mounts a quota endpoint that always has budget left
pub async fn mount_open_quota(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/application/rate_limit_status.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quota_json(180, 0)))
        .mount(server)
        .await;
}
