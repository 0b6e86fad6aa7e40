//! Mirror freshness checks against a mock mirror

use bushel::monitoring::{
    check_index_created, run_checks, Category, Check, CheckStatus, CollectorIndex, CollectorRemote, TimestampFormat,
    CATEGORIES,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 5, 3, 17, 30, 0).unwrap()
}

async fn mirror_serving(index: Value) -> (MockServer, CollectorRemote) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index))
        .expect(1)
        .mount(&server)
        .await;
    let remote = CollectorRemote::with_client(Client::new(), server.uri());
    (server, remote)
}

fn index_created_minutes_ago(minutes: i64) -> Value {
    json!({
        "index_created": (now() - Duration::minutes(minutes)).format("%Y-%m-%d %H:%M").to_string(),
        "directories": []
    })
}

fn file_name(category: &Category, timestamp: DateTime<Utc>) -> String {
    match category.format {
        TimestampFormat::Dashed => format!("{}-{}", timestamp.format("%Y-%m-%d-%H-%M-%S"), category.name),
        TimestampFormat::Compact => format!("{}-{}", timestamp.format("%Y%m%d-%H%M%S"), "F".repeat(40)),
    }
}

/// Nests `files` under each component of `path`
fn insert_directory(directories: &mut Vec<Value>, path: &[&str], files: Vec<Value>) {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };

    let position = match directories.iter().position(|d| d["path"] == *first) {
        Some(position) => position,
        None => {
            directories.push(json!({"path": first, "directories": [], "files": []}));
            directories.len() - 1
        }
    };
    let directory = &mut directories[position];

    if rest.is_empty() {
        directory["files"] = Value::Array(files);
    } else if let Some(children) = directory["directories"].as_array_mut() {
        insert_directory(children, rest, files);
    }
}

/// An index where every category's newest file is `age` old
fn full_index(age: Duration) -> Value {
    let mut directories = Vec::new();
    for category in CATEGORIES {
        let components: Vec<&str> = category.path.split('/').collect();
        let files = vec![
            json!({"path": file_name(category, now() - age - Duration::hours(1)), "size": 1}),
            json!({"path": file_name(category, now() - age), "size": 1}),
        ];
        insert_directory(&mut directories, &components, files);
    }

    json!({
        "index_created": (now() - Duration::minutes(5)).format("%Y-%m-%d %H:%M").to_string(),
        "path": "https://mirror.example.org",
        "directories": directories
    })
}

#[tokio::test]
async fn test_index_created_thresholds() {
    for (minutes, expected) in [
        (10, CheckStatus::Ok),
        (16, CheckStatus::Warning),
        (21, CheckStatus::Critical),
    ] {
        let (_server, remote) = mirror_serving(index_created_minutes_ago(minutes)).await;
        let index: CollectorIndex = remote.get_index().await.unwrap();
        let result = check_index_created(&index, now()).unwrap();
        assert_eq!(result.status, expected, "index created {} minutes ago", minutes);
    }
}

#[tokio::test]
async fn test_all_checks_pass_on_fresh_mirror() {
    let (_server, remote) = mirror_serving(full_index(Duration::minutes(30))).await;

    let results = run_checks(&remote, &Check::all(), now()).await;
    assert_eq!(results.len(), CATEGORIES.len() + 1);
    for (check, result) in results {
        assert_eq!(result.status, CheckStatus::Ok, "{}: {}", check.name(), result);
    }
}

#[tokio::test]
async fn test_stale_categories_escalate() {
    let categories: Vec<Check> = Check::all().into_iter().filter(|c| c.name() != "index").collect();

    let (_server, remote) = mirror_serving(full_index(Duration::minutes(85))).await;
    for (_, result) in run_checks(&remote, &categories, now()).await {
        assert_eq!(result.status, CheckStatus::Warning);
    }

    let (_server, remote) = mirror_serving(full_index(Duration::minutes(95))).await;
    for (_, result) in run_checks(&remote, &categories, now()).await {
        assert_eq!(result.status, CheckStatus::Critical);
    }
}

#[tokio::test]
async fn test_unreachable_mirror_is_critical() {
    let server = MockServer::start().await;
    let remote = CollectorRemote::with_client(Client::new(), server.uri());

    // No mocks mounted: wiremock answers 404
    let results = run_checks(&remote, &[Check::IndexCreated], now()).await;
    assert_eq!(results[0].1.status, CheckStatus::Critical);
    assert!(results[0].1.to_string().starts_with("CRITICAL: "));
}
