use std::{
    future::{pending, ready},
    io::Write,
    path::PathBuf,
    time::{Duration, Instant},
};

use mockito::{Matcher, Server};
use provision::{
    ConfigError, DesiredState, Outcome, ProvisionError, Provisioner, Settings,
    error::{EXIT_FAILURE, EXIT_NOT_READY, EXIT_OK},
    reconciler::CANCELLED_DETAIL,
    report::render_text,
    summarize,
};
use serde_json::json;
use tempfile::TempDir;
use url::Url;

fn settings(base_url: &str) -> Settings {
    Settings {
        base_url: Url::parse(base_url).unwrap(),
        token: "test_token".to_owned(),
        request_timeout: Duration::from_secs(2),
        ready_max_attempts: 2,
        ready_interval: Duration::from_millis(10),
        dry_run: false,
    }
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("monitors.yaml");
    std::fs::File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
    path
}

const DB_ONLY: &str = r#"
monitors:
  - name: DB
    kind: TCP
    target: postgres
    port: 5432
    intervalSeconds: 120
    timeoutSeconds: 5
    maxRetries: 3
"#;

#[tokio::test]
async fn single_tcp_monitor_is_created() {
    let mut server = Server::new_async().await;
    let probe = server.mock("GET", "/").with_status(302).create_async().await;
    let create = server
        .mock("POST", "/api/monitors")
        .match_header("authorization", "Bearer test_token")
        .match_body(Matcher::Json(json!({
            "name": "DB",
            "url": "postgres:5432",
            "type": "tcp",
            "interval": 120,
            "timeout": 5,
            "maxRetries": 3,
            "resendInterval": 0
        })))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let desired = DesiredState::load(write_config(&dir, DB_ONLY)).unwrap();
    let provisioner = Provisioner::from_settings(settings(&server.url())).unwrap();

    let results = provisioner.run(&desired, pending()).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome(), Outcome::Created);
    assert_eq!(summarize(&results).exit_code(), EXIT_OK);
    probe.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn rerun_against_conflicting_service_is_idempotent() {
    let mut server = Server::new_async().await;
    let _probe = server.mock("GET", "/").create_async().await;
    let created = server
        .mock("POST", "/api/monitors")
        .with_body(r#"{"ok":true,"msg":"Added Successfully.","monitorID":1}"#)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let desired = DesiredState::load(write_config(&dir, DB_ONLY)).unwrap();
    let provisioner = Provisioner::from_settings(settings(&server.url())).unwrap();

    let first = provisioner.run(&desired, pending()).await.unwrap();
    created.remove_async().await;
    let _conflict = server.mock("POST", "/api/monitors").with_status(409).create_async().await;
    let second = provisioner.run(&desired, pending()).await.unwrap();

    assert_eq!(first[0].outcome(), Outcome::Created);
    assert_eq!(second[0].outcome(), Outcome::AlreadyExists);
    assert_eq!(summarize(&second).exit_code(), EXIT_OK);
}

#[tokio::test]
async fn duplicate_names_fail_before_any_request() {
    let mut server = Server::new_async().await;
    let probe = server.mock("GET", Matcher::Any).expect(0).create_async().await;
    let create = server.mock("POST", Matcher::Any).expect(0).create_async().await;

    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
monitors:
  - {name: DB, kind: tcp, target: postgres, port: 5432, intervalSeconds: 60, timeoutSeconds: 5}
  - {name: DB, kind: port, target: postgres, port: 5432, intervalSeconds: 60, timeoutSeconds: 5}
"#,
    );

    let err = DesiredState::load(path).unwrap_err();

    assert!(matches!(err, ConfigError::DuplicateName { ref name } if name == "DB"));
    assert_eq!(ProvisionError::from(err).exit_code(), EXIT_FAILURE);
    probe.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn unreachable_service_aborts_before_reconciling() {
    let dir = TempDir::new().unwrap();
    let desired = DesiredState::load(write_config(&dir, DB_ONLY)).unwrap();
    let provisioner = Provisioner::from_settings(settings("http://127.0.0.1:9")).unwrap();

    let err = provisioner.run(&desired, pending()).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Timeout(ref t) if t.attempts == 2));
    assert_eq!(err.exit_code(), EXIT_NOT_READY);
}

#[tokio::test]
async fn mixed_outcomes_report_failure() {
    let mut server = Server::new_async().await;
    let _probe = server.mock("GET", "/").create_async().await;
    let _web = server
        .mock("POST", "/api/monitors")
        .match_body(Matcher::PartialJson(json!({"name": "Web"})))
        .with_body(r#"{"ok":true,"msg":"Added"}"#)
        .create_async()
        .await;
    let _cache = server
        .mock("POST", "/api/monitors")
        .match_body(Matcher::PartialJson(json!({"name": "Cache"})))
        .with_status(500)
        .with_body("disk full")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
monitors:
  - name: Web
    kind: http
    target: http://frontend:8080
    intervalSeconds: 60
    timeoutSeconds: 48
  - name: Cache
    kind: port
    target: redis
    port: 6379
    intervalSeconds: 60
    timeoutSeconds: 5
"#,
    );
    let desired = DesiredState::load(path).unwrap();
    let provisioner = Provisioner::from_settings(settings(&server.url())).unwrap();

    let results = provisioner.run(&desired, pending()).await.unwrap();
    let summary = summarize(&results);
    let mut out = Vec::new();
    render_text(&results, &summary, &mut out).unwrap();

    assert_eq!(summary.exit_code(), EXIT_FAILURE);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "CREATED Web (http) Added\n\
         FAILED  Cache (port) HTTP 500 Internal Server Error: disk full\n\
         2 monitors: 1 created, 0 already present, 1 failed\n"
    );
}

#[tokio::test]
async fn dry_run_skips_the_service_entirely() {
    let dir = TempDir::new().unwrap();
    let desired = DesiredState::load(write_config(&dir, DB_ONLY)).unwrap();
    let mut settings = settings("http://127.0.0.1:9");
    settings.dry_run = true;
    let provisioner = Provisioner::from_settings(settings).unwrap();

    let results = provisioner.run(&desired, pending()).await.unwrap();

    assert_eq!(results[0].outcome(), Outcome::Created);
    assert_eq!(results[0].detail(), "dry run");
}

#[tokio::test]
async fn server_error_mentioning_duplicates_is_a_failure() {
    let mut server = Server::new_async().await;
    let _probe = server.mock("GET", "/").create_async().await;
    let _create = server
        .mock("POST", "/api/monitors")
        .with_status(500)
        .with_body("ERROR: duplicate key value violates unique constraint; transaction aborted")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let desired = DesiredState::load(write_config(&dir, DB_ONLY)).unwrap();
    let provisioner = Provisioner::from_settings(settings(&server.url())).unwrap();

    let results = provisioner.run(&desired, pending()).await.unwrap();

    assert_eq!(results[0].outcome(), Outcome::Failed);
    assert!(results[0].detail().contains("duplicate key value"));
    assert_eq!(summarize(&results).exit_code(), EXIT_FAILURE);
}

#[tokio::test]
async fn shutdown_during_readiness_wait_cancels_the_run() {
    let dir = TempDir::new().unwrap();
    let desired = DesiredState::load(write_config(&dir, DB_ONLY)).unwrap();
    let mut settings = settings("http://127.0.0.1:9");
    settings.ready_max_attempts = 100;
    settings.ready_interval = Duration::from_secs(30);
    let provisioner = Provisioner::from_settings(settings).unwrap();

    let started = Instant::now();
    let results = provisioner.run(&desired, ready(())).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome(), Outcome::Failed);
    assert_eq!(results[0].detail(), CANCELLED_DETAIL);
    assert_eq!(summarize(&results).exit_code(), EXIT_FAILURE);
}

#[tokio::test]
async fn shutdown_after_first_probe_stops_waiting() {
    let dir = TempDir::new().unwrap();
    let desired = DesiredState::load(write_config(&dir, DB_ONLY)).unwrap();
    let mut settings = settings("http://127.0.0.1:9");
    settings.ready_max_attempts = 100;
    settings.ready_interval = Duration::from_secs(30);
    let provisioner = Provisioner::from_settings(settings).unwrap();

    let started = Instant::now();
    let results =
        provisioner.run(&desired, tokio::time::sleep(Duration::from_millis(200))).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results[0].detail(), CANCELLED_DETAIL);
}
