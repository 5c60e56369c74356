//! HTTP implementation of the search capability
//!
//! This module handles:
//! - Building the HTTP client with a proper user agent and timeouts
//! - Issuing bounded search queries
//! - Probing the rate limit status of the search endpoint
//! - Classifying every failure as a transient `SearchError`

use crate::quota::QuotaState;
use crate::search::types::{QuerySpec, RawStatus, SearchResponse};
use crate::search::SearchClient;
use crate::SearchError;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Resource key the rate limit status reports the search endpoint under
pub const SEARCH_ENDPOINT: &str = "/search/tweets";

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use search_harvest::search::build_http_client;
///
/// let client = build_http_client().unwrap();
/// ```
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Debug, Deserialize)]
struct RateLimitStatus {
    resources: HashMap<String, HashMap<String, EndpointLimit>>,
}

#[derive(Debug, Deserialize)]
struct EndpointLimit {
    remaining: i64,
    /// Epoch seconds; 0 when the server does not know yet
    reset: i64,
}

/// Search client speaking the REST search API over HTTP
pub struct HttpSearchClient {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpSearchClient {
    /// Creates a client for the API rooted at `base_url`
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<T, SearchError> {
        let url = format!("{}{}?{}", self.base_url, endpoint, query);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SearchError::Payload(e.to_string()))
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, query: &QuerySpec) -> Result<Vec<RawStatus>, SearchError> {
        let endpoint = format!("{}.json", SEARCH_ENDPOINT);
        let response: SearchResponse = self.get_json(&endpoint, &query.to_query_string()).await?;
        Ok(response.statuses)
    }

    async fn check_quota(&self) -> Result<QuotaState, SearchError> {
        let status: RateLimitStatus = self
            .get_json("/application/rate_limit_status.json", "resources=search")
            .await?;

        let limit = status
            .resources
            .get("search")
            .and_then(|search| search.get(SEARCH_ENDPOINT))
            .ok_or_else(|| {
                SearchError::Payload(format!("rate limit status lacks {}", SEARCH_ENDPOINT))
            })?;

        let reset_at = if limit.reset == 0 {
            None
        } else {
            Utc.timestamp_opt(limit.reset, 0).single()
        };

        Ok(QuotaState {
            remaining: limit.remaining.max(0),
            reset_at,
        })
    }
}
