//! End-to-end harvest cycles against a mock API

use super::{mount_open_quota, page_json, quota_json, status_json, TOKEN};
use search_harvest::clock::SystemClock;
use search_harvest::crawler::{CrawlState, HarvestSettings, Harvester, Phase};
use search_harvest::storage::{zone_from_hours, Checkpoint, Period};
use search_harvest::{CrawlCursor, HarvestError, HttpSearchClient, Transition};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE_QUERY: &str = "q=hello&result_type=recent&count=3";

/// Creates settings with very short pauses for testing
fn test_settings(dir: &Path) -> HarvestSettings {
    HarvestSettings {
        base_query: BASE_QUERY.to_string(),
        sleep_interval: Duration::from_millis(10),
        idle_interval: Duration::from_millis(20),
        rotation_enabled: true,
        zone: zone_from_hours(9),
        data_file: dir.join("data.csv"),
        data_dir: dir.join("data"),
        checkpoint_path: Some(dir.join("state.json")),
    }
}

fn test_harvester(server: &MockServer, dir: &Path, since_id: u64) -> Harvester<HttpSearchClient> {
    let client = HttpSearchClient::new(server.uri(), TOKEN).unwrap();
    let clock = Arc::new(SystemClock);
    let settings = test_settings(dir);
    let period = Period::containing(chrono::Utc::now(), &settings.zone);
    Harvester::new(client, settings, CrawlState::new(since_id, period), clock)
}

fn data_ids(dir: &Path) -> Vec<u64> {
    std::fs::read_to_string(dir.join("data.csv"))
        .unwrap_or_default()
        .lines()
        .map(|line| line.split(',').nth(1).unwrap().parse().unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_sweep_then_idle() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_open_quota(&mock_server).await;

    // Second page of the sweep: below max_id there is nothing left
    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("since_id", "100"))
        .and(query_param("max_id", "149"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // First page of the sweep
    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("q", "hello"))
        .and(query_param("since_id", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![
            status_json(200, "newest"),
            status_json(180, "RT @someone: re-shared"),
            status_json(150, "oldest"),
        ])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    // After the rewind nothing is newer than 200
    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("since_id", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut harvester = test_harvester(&mock_server, dir.path(), 100);

    let first = harvester.step().await.unwrap();
    assert_eq!(
        first,
        Transition::Collected {
            fetched: 3,
            written: 2,
            new_max_id: 149
        }
    );

    let second = harvester.step().await.unwrap();
    assert_eq!(
        second,
        Transition::Rewound {
            since_id: 200,
            written: 0
        }
    );
    assert_eq!(harvester.state().cursor, CrawlCursor::starting_at(200));

    let third = harvester.step().await.unwrap();
    assert_eq!(third, Transition::Idled { rotated: false });
    assert_eq!(harvester.state().phase, Phase::ForwardSweep);

    // The re-shared record was filtered out
    assert_eq!(data_ids(dir.path()), vec![200, 150]);

    let checkpoint = Checkpoint::load(&dir.path().join("state.json"))
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.since_id, 200);
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_open_quota(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("since_id", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![
            status_json(30, "a"),
            status_json(20, "b"),
        ])))
        .mount(&mock_server)
        .await;

    let mut harvester = test_harvester(&mock_server, dir.path(), 10);
    let transition = harvester.step().await.unwrap();

    assert_eq!(
        transition,
        Transition::Collected {
            fetched: 2,
            written: 2,
            new_max_id: 19
        }
    );
    assert_eq!(data_ids(dir.path()), vec![30, 20]);
}

#[tokio::test]
async fn test_quota_checked_before_search() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/application/rate_limit_status.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quota_json(1, 0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut harvester = test_harvester(&mock_server, dir.path(), 5);
    harvester.step().await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.path(), "/application/rate_limit_status.json");
    assert_eq!(requests[1].url.path(), "/search/tweets.json");
}

#[tokio::test]
async fn test_unusable_result_stops_the_harvest() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_open_quota(&mock_server).await;

    let mut broken = status_json(42, "no timestamp");
    broken["created_at"] = serde_json::Value::Null;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(vec![status_json(43, "fine"), broken])),
        )
        .mount(&mock_server)
        .await;

    let mut harvester = test_harvester(&mock_server, dir.path(), 1);
    let err = harvester.run().await.unwrap_err();

    assert!(matches!(err, HarvestError::DataContract(_)));
    assert_eq!(err.exit_code(), 2);
    // Nothing of the failed page was written
    assert!(data_ids(dir.path()).is_empty());
}

#[tokio::test]
async fn test_startup_in_new_month_rotates_on_first_idle() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_open_quota(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![])))
        .mount(&mock_server)
        .await;

    std::fs::write(
        dir.path().join("data.csv"),
        "2020-01-31T10:00:00+09:00,2,bob,old row,false,,\n\
         2020-01-05T10:00:00+09:00,1,bob,older row,false,,\n",
    )
    .unwrap();

    let client = HttpSearchClient::new(mock_server.uri(), TOKEN).unwrap();
    let january: Period = "2020-01".parse().unwrap();
    let mut harvester = Harvester::new(
        client,
        test_settings(dir.path()),
        CrawlState::new(2, january),
        Arc::new(SystemClock),
    );

    let transition = harvester.step().await.unwrap();

    assert_eq!(transition, Transition::Idled { rotated: true });
    assert_eq!(
        harvester.state().rotation.active_period,
        harvester.current_period()
    );
    let archive = std::fs::read_to_string(dir.path().join("data/2020-01.csv")).unwrap();
    assert_eq!(
        archive,
        "2020-01-05T10:00:00+09:00,1,bob,older row,false,,\n\
         2020-01-31T10:00:00+09:00,2,bob,old row,false,,\n"
    );
    assert_eq!(std::fs::read_to_string(dir.path().join("data.csv")).unwrap(), "");
    assert!(dir.path().join("data.csv.2020-01.bak").exists());
    assert!(!dir.path().join("data.csv.bak").exists());
}
