//! HTTP search client against a mock API

use super::{page_json, quota_json, status_json, TOKEN};
use chrono::{TimeZone, Utc};
use search_harvest::search::RawStatus;
use search_harvest::{HttpSearchClient, QuerySpec, SearchClient, SearchError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bounded(since_id: u64, max_id: Option<u64>) -> QuerySpec {
    QuerySpec {
        base: "q=hello%20world&result_type=recent&count=2".to_string(),
        since_id: Some(since_id),
        max_id,
    }
}

#[tokio::test]
async fn test_search_sends_bounds_and_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("q", "hello world"))
        .and(query_param("count", "2"))
        .and(query_param("since_id", "100"))
        .and(query_param("max_id", "500"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![
            status_json(480, "first"),
            status_json(470, "second"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpSearchClient::new(mock_server.uri(), TOKEN).unwrap();
    let statuses: Vec<RawStatus> = client.search(&bounded(100, Some(500))).await.unwrap();

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].id, Some(480));
    assert_eq!(statuses[1].text.as_deref(), Some("second"));
    assert_eq!(
        statuses[0].user.as_ref().and_then(|u| u.screen_name.as_deref()),
        Some("user0")
    );
}

#[tokio::test]
async fn test_search_non_success_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = HttpSearchClient::new(mock_server.uri(), TOKEN).unwrap();
    let err = client.search(&bounded(1, None)).await.unwrap_err();

    assert!(matches!(err, SearchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_search_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let client = HttpSearchClient::new(mock_server.uri(), TOKEN).unwrap();
    let err = client.search(&bounded(1, None)).await.unwrap_err();

    assert!(matches!(err, SearchError::Payload(_)));
}

#[tokio::test]
async fn test_check_quota_decodes_remaining_and_reset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/application/rate_limit_status.json"))
        .and(query_param("resources", "search"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quota_json(17, 1403602426)))
        .mount(&mock_server)
        .await;

    let client = HttpSearchClient::new(format!("{}/", mock_server.uri()), TOKEN).unwrap();
    let quota = client.check_quota().await.unwrap();

    assert_eq!(quota.remaining, 17);
    assert_eq!(quota.reset_at, Utc.timestamp_opt(1403602426, 0).single());
}

#[tokio::test]
async fn test_check_quota_unknown_reset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/application/rate_limit_status.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quota_json(0, 0)))
        .mount(&mock_server)
        .await;

    let client = HttpSearchClient::new(mock_server.uri(), TOKEN).unwrap();
    let quota = client.check_quota().await.unwrap();

    assert_eq!(quota.remaining, 0);
    assert_eq!(quota.reset_at, None);
}

#[tokio::test]
async fn test_check_quota_missing_resource() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/application/rate_limit_status.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"resources": {}})),
        )
        .mount(&mock_server)
        .await;

    let client = HttpSearchClient::new(mock_server.uri(), TOKEN).unwrap();
    let err = client.check_quota().await.unwrap_err();

    assert!(matches!(err, SearchError::Payload(_)));
}
