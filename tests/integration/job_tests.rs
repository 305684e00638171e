//! End-to-end job tests
//!
//! These tests drive the real fetchers against wiremock servers and
//! persist through the JSON file store in a temporary directory.

use crate::common::{create_test_config, detail_page, match_document};
use match_harvester::config::Config;
use match_harvester::fetch::FetcherSet;
use match_harvester::harvester::ControllerSettings;
use match_harvester::output::ExportFormat;
use match_harvester::storage::{CheckpointStore, JsonFileStore};
use match_harvester::{HarvestError, JobController, JobOptions, JobRequest, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DETAIL_PATH: &str = "/Club/Matches/Match.aspx";
const QUERY_PATH: &str = "/chppxml.ashx";

fn store_for(config: &Config) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::new(
        &config.output.checkpoint_path,
        &config.output.results_path,
    ))
}

fn create_controller(config: &Config, store: Arc<JsonFileStore>) -> JobController {
    let fetchers = FetcherSet::from_config(config).expect("Failed to build fetchers");
    let settings = ControllerSettings::from_config(&config.job, Some("test-hash".to_string()));
    JobController::new(fetchers, store, settings)
}

fn session_options() -> JobOptions {
    JobOptions {
        use_structured_api: false,
        ..JobOptions::default()
    }
}

fn structured_options() -> JobOptions {
    JobOptions {
        use_structured_api: true,
        ..JobOptions::default()
    }
}

async fn mount_page(server: &MockServer, match_id: u64, body: String) {
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("matchID", match_id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_session_range_job_records_blocked_page_as_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_page(&server, 1, detail_page("Rovers", "United", "3 - 1")).await;
    mount_page(&server, 2, "<html><body>Please log in</body></html>".to_string()).await;
    mount_page(&server, 3, detail_page("Athletic", "Wanderers", "0 - 0")).await;

    let store = store_for(&config);
    let controller = create_controller(&config, Arc::clone(&store));

    let mut handle = controller
        .start(JobRequest::Range { start: 1, end: 3 }, session_options(), None)
        .await
        .unwrap();
    let progress = handle.wait().await;

    assert_eq!(progress.status, JobStatus::Completed);
    assert_eq!(progress.cursor, 3);
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.failed, 1);
    assert!(progress.last_error.is_none());

    let results = controller.results();
    let ids: Vec<u64> = results.iter().map(|r| r.match_id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(results[0].home.name, "Rovers");
    assert_eq!(results[0].home.goals, Some(3));
    assert_eq!(results[0].away.goals, Some(1));
    assert_eq!(results[0].events.len(), 1);
    assert!(results[0].events[0].is_home);

    let failures = controller.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].match_id, 2);

    // Completion removes the checkpoint and leaves the full result set
    assert!(store.load_checkpoint().await.unwrap().is_none());
    assert_eq!(store.load_results().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_structured_list_job() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .and(query_param("file", "matchdetails"))
        .and(query_param("matchID", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_string(match_document(10, "Rovers", "United")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .and(query_param("matchID", "11"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let controller = create_controller(&config, store_for(&config));

    let mut handle = controller
        .start(
            JobRequest::ExplicitList("10, 11\n10".to_string()),
            structured_options(),
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap();
    let progress = handle.wait().await;

    assert_eq!(progress.status, JobStatus::Completed);
    assert_eq!(progress.total, 3);
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.failed, 1);

    let results = controller.results();
    assert!(results.iter().all(|r| r.match_id == 10));
    assert_eq!(results[0].home.ratings.midfield, Some(31.0));
    assert!(!results[0].events[0].is_home);
    assert_eq!(controller.failures()[0].match_id, 11);
}

#[tokio::test]
async fn test_disabled_sessions_refuse_to_start() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path());
    config.source.isolated_sessions = false;

    let store = store_for(&config);
    let controller = create_controller(&config, Arc::clone(&store));

    let result = controller
        .start(JobRequest::Range { start: 1, end: 3 }, session_options(), None)
        .await;

    assert!(matches!(result, Err(HarvestError::Acquisition(_))));
    assert_eq!(controller.status(), JobStatus::Idle);
    assert!(store.load_checkpoint().await.unwrap().is_none());
}

#[tokio::test]
async fn test_paused_job_resumes_in_new_controller() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    for id in 1..=4u64 {
        Mock::given(method("GET"))
            .and(path(QUERY_PATH))
            .and(query_param("matchID", id.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(match_document(id, "Rovers", "United"))
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;
    }

    let paused = {
        let controller = create_controller(&config, store_for(&config));
        let mut handle = controller
            .start(JobRequest::Range { start: 1, end: 4 }, structured_options(), None)
            .await
            .unwrap();
        controller.pause().unwrap();
        handle.wait().await
    };

    assert_eq!(paused.status, JobStatus::Paused);
    assert!(paused.cursor < 4);

    // A fresh controller finds the saved job and continues it
    let store = store_for(&config);
    let controller = create_controller(&config, Arc::clone(&store));
    let offer = controller
        .load_on_startup()
        .await
        .unwrap()
        .expect("paused job should be offered");
    assert_eq!(offer.cursor(), paused.cursor);
    assert_eq!(offer.total(), 4);
    assert!(offer.options().use_structured_api);

    let restored = controller.restore(offer).await.unwrap();
    assert_eq!(restored.status, JobStatus::Paused);
    assert_eq!(restored.cursor, paused.cursor);

    let mut handle = controller.resume().await.unwrap();
    let finished = handle.wait().await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.completed, 4);
    let ids: Vec<u64> = controller.results().iter().map(|r| r.match_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert!(store.load_checkpoint().await.unwrap().is_none());
    assert_eq!(store.load_results().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_exported_csv_is_readable() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_page(&server, 7, detail_page("Rovers &amp; Co", "United", "2 - 2")).await;

    let controller = create_controller(&config, store_for(&config));
    let mut handle = controller
        .start(JobRequest::ExplicitList("7".to_string()), session_options(), None)
        .await
        .unwrap();
    handle.wait().await;

    let bytes = controller.export(ExportFormat::Csv).unwrap();
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes.as_slice());

    let headers = reader.headers().unwrap().clone();
    let id_column = headers.iter().position(|h| h == "Match ID").unwrap();
    let home_column = headers.iter().position(|h| h == "Home Team").unwrap();

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][id_column], "7");
    assert_eq!(&rows[0][home_column], "Rovers & Co");

    let json = controller.export(ExportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value.as_array().map(Vec::len), Some(1));
}
