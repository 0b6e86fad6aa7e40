//! End-to-end crawls through the built-in plugins against a mock directory port

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use bushel::archive::Archive;
use bushel::config::{parse_config, Config};
use bushel::crawler::{crawl, CrawlOutcome, CrawlSummary, FailureKind};
use bushel::plugins::{valid_after_at, CONSENSUS_SUBJECT};
use bushel::{DocType, DocumentIdentifier};
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PUBLISHED: &str = "2019-05-03 16:00:00";
const SIGNATURE_LINE: &str = "router-signature\n";
const CONSENSUS_PATH: &str = "/tor/status-vote/current/consensus";
const VOTE_PATH: &str = "/tor/status-vote/current/authority";

fn directory_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn signed_portion(document: &str) -> &str {
    let end = document.find(SIGNATURE_LINE).unwrap() + SIGNATURE_LINE.len();
    &document[..end]
}

fn sha1_hex(data: &str) -> String {
    hex::encode(Sha1::digest(data.as_bytes()))
}

fn sha1_base64(data: &str) -> String {
    STANDARD_NO_PAD.encode(Sha1::digest(data.as_bytes()))
}

fn signed(body: String) -> String {
    format!(
        "{}{}-----BEGIN SIGNATURE-----\nc2lnbmF0dXJl\n-----END SIGNATURE-----\n",
        body, SIGNATURE_LINE
    )
}

fn extra_info(index: usize) -> String {
    signed(format!(
        "extra-info relay{} {}\npublished {}\nwrite-history {} (900 s) 1024,2048\n",
        index,
        "A".repeat(40),
        PUBLISHED,
        PUBLISHED
    ))
}

fn server_descriptor(index: usize, extra_info_digest: &str) -> String {
    signed(format!(
        "router relay{} 10.0.0.{} 9001 0 0\npublished {}\nextra-info-digest {}\nbandwidth 1000 2000 1500\n",
        index,
        index + 1,
        PUBLISHED,
        extra_info_digest.to_ascii_uppercase()
    ))
}

/// Five relays; relays 0 and 1 share extra-info E0, 2 and 3 share E1, 4 has E2
struct Network {
    extra_infos: Vec<String>,
    descriptors: Vec<String>,
    consensus: String,
    router_statuses: String,
}

impl Network {
    /// A network whose consensus is valid from the top of the current hour
    fn new() -> Self {
        Self::valid_after(valid_after_at(Utc::now()))
    }

    fn valid_after(valid_after: DateTime<Utc>) -> Self {
        let extra_infos: Vec<String> = (0..3).map(extra_info).collect();
        let extra_digests: Vec<String> = extra_infos
            .iter()
            .map(|doc| sha1_hex(signed_portion(doc)))
            .collect();

        let descriptors: Vec<String> = (0..5)
            .map(|i| server_descriptor(i, &extra_digests[i / 2]))
            .collect();

        let mut router_statuses = String::new();
        for (i, descriptor) in descriptors.iter().enumerate() {
            router_statuses.push_str(&format!(
                "r relay{} {} {} {} 10.0.0.{} 9001 0\ns Fast Running Valid\n",
                i,
                STANDARD_NO_PAD.encode([i as u8; 20]),
                sha1_base64(signed_portion(descriptor)),
                PUBLISHED,
                i + 1
            ));
        }
        let consensus = format!(
            "network-status-version 3\nvote-status consensus\nvalid-after {}\n{}directory-footer\n",
            directory_time(valid_after),
            router_statuses
        );

        Self {
            extra_infos,
            descriptors,
            consensus,
            router_statuses,
        }
    }

    /// A vote listing the same relays as the consensus
    fn vote(&self) -> String {
        format!(
            "network-status-version 3\nvote-status vote\nvalid-after {}\n{}directory-footer\n",
            directory_time(valid_after_at(Utc::now())),
            self.router_statuses
        )
    }

    fn descriptor_path(&self, index: usize) -> String {
        format!(
            "/tor/server/d/{}",
            sha1_hex(signed_portion(&self.descriptors[index])).to_ascii_uppercase()
        )
    }

    fn extra_info_path(&self, index: usize) -> String {
        format!(
            "/tor/extra/d/{}",
            sha1_hex(signed_portion(&self.extra_infos[index])).to_ascii_uppercase()
        )
    }
}

async fn serve(server: &MockServer, route: String, body: String, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn config_for(server: &MockServer, dir: &TempDir) -> Config {
    config_with_authorities(server, dir, &[])
}

fn config_with_authorities(server: &MockServer, dir: &TempDir, authorities: &[&MockServer]) -> Config {
    let authorities: Vec<String> = authorities
        .iter()
        .map(|authority| format!("\"{}\"", authority.address()))
        .collect();
    let toml = format!(
        r#"
[crawler]
max-concurrent-fetches = 4
max-retry-attempts = 3
retry-backoff-base = 1
retry-backoff-cap = 5

[user-agent]
crawler-name = "bushel-test"
crawler-version = "0.1.0"
contact-url = "https://example.org/bushel"
contact-email = "archive@example.org"

[archive]
path = "{}"

[directory]
endpoints = ["{}"]
authorities = [{}]
timeout = 5
"#,
        dir.path().join("archive").display(),
        server.address(),
        authorities.join(", ")
    );
    parse_config(&toml).expect("Test config should be valid")
}

async fn run_crawl(server: &MockServer, dir: &TempDir) -> CrawlSummary {
    crawl(config_for(server, dir), "test", CancellationToken::new())
        .await
        .expect("Crawl failed")
}

#[tokio::test]
async fn test_crawl_follows_consensus_references() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let network = Network::new();

    serve(&server, CONSENSUS_PATH.to_string(), network.consensus.clone(), 1).await;
    for i in 0..5 {
        serve(&server, network.descriptor_path(i), network.descriptors[i].clone(), 1).await;
    }
    for i in 0..3 {
        serve(&server, network.extra_info_path(i), network.extra_infos[i].clone(), 1).await;
    }

    let summary = run_crawl(&server, &dir).await;

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.discovered, 9);
    assert_eq!(summary.stored, 9);
    assert_eq!(summary.mismatched, 0);
    assert!(summary.failures.is_empty(), "unexpected failures: {:?}", summary.failures);
}

#[tokio::test]
async fn test_tampered_descriptor_is_not_followed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let network = Network::new();

    serve(&server, CONSENSUS_PATH.to_string(), network.consensus.clone(), 1).await;
    for i in 0..4 {
        serve(&server, network.descriptor_path(i), network.descriptors[i].clone(), 1).await;
    }
    let tampered = network.descriptors[4].replace("bandwidth 1000", "bandwidth 9999");
    serve(&server, network.descriptor_path(4), tampered, 1).await;
    serve(&server, network.extra_info_path(0), network.extra_infos[0].clone(), 1).await;
    serve(&server, network.extra_info_path(1), network.extra_infos[1].clone(), 1).await;
    serve(&server, network.extra_info_path(2), network.extra_infos[2].clone(), 0).await;

    let summary = run_crawl(&server, &dir).await;

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.mismatched, 1);
    assert_eq!(summary.discovered, 8);
    assert_eq!(summary.stored, 7);
}

#[tokio::test]
async fn test_directory_errors_are_classified() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let network = Network::new();

    serve(&server, CONSENSUS_PATH.to_string(), network.consensus.clone(), 1).await;
    for i in 0..5 {
        serve(&server, network.descriptor_path(i), network.descriptors[i].clone(), 1).await;
    }

    // E0 is briefly overloaded, E1 is gone
    Mock::given(method("GET"))
        .and(path(network.extra_info_path(0)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    serve(&server, network.extra_info_path(0), network.extra_infos[0].clone(), 1).await;
    Mock::given(method("GET"))
        .and(path(network.extra_info_path(1)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    serve(&server, network.extra_info_path(2), network.extra_infos[2].clone(), 1).await;

    let summary = run_crawl(&server, &dir).await;

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.stored, 8);
    assert_eq!(summary.failed, 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.kind, FailureKind::Permanent);
    assert_eq!(failure.identifier.doctype(), &DocType::ExtraInfo);
    assert_eq!(failure.attempts, 1);
}

#[tokio::test]
async fn test_stale_consensus_is_not_archived() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let stale = Network::valid_after(valid_after_at(Utc::now()) - chrono::Duration::hours(3));

    // Every attempt sees the stale document, and nothing it references is requested
    serve(&server, CONSENSUS_PATH.to_string(), stale.consensus.clone(), 4).await;
    serve(&server, stale.descriptor_path(0), stale.descriptors[0].clone(), 0).await;

    let summary = run_crawl(&server, &dir).await;

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.stored, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].kind, FailureKind::RetriesExhausted);
    assert!(summary.failures[0].message.contains("valid-after"));

    let archive = Archive::open(&dir.path().join("archive"), &dir.path().join("archive").join("index.db")).unwrap();
    let current = DocumentIdentifier::new(DocType::Consensus, CONSENSUS_SUBJECT, valid_after_at(Utc::now()));
    assert!(archive.entry(&current).unwrap().is_none());
}

#[tokio::test]
async fn test_votes_are_fetched_from_each_authority() {
    let mirror = MockServer::start().await;
    let first_authority = MockServer::start().await;
    let second_authority = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let network = Network::new();

    serve(&mirror, CONSENSUS_PATH.to_string(), network.consensus.clone(), 1).await;
    serve(&mirror, VOTE_PATH.to_string(), network.vote(), 0).await;
    for i in 0..5 {
        serve(&mirror, network.descriptor_path(i), network.descriptors[i].clone(), 1).await;
    }
    for i in 0..3 {
        serve(&mirror, network.extra_info_path(i), network.extra_infos[i].clone(), 1).await;
    }
    for authority in [&first_authority, &second_authority] {
        serve(authority, VOTE_PATH.to_string(), network.vote(), 1).await;
    }

    let config = config_with_authorities(&mirror, &dir, &[&first_authority, &second_authority]);
    let summary = crawl(config, "test", CancellationToken::new())
        .await
        .expect("Crawl failed");

    // The votes reference the same descriptors as the consensus
    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.discovered, 11);
    assert_eq!(summary.stored, 11);
    assert!(summary.failures.is_empty(), "unexpected failures: {:?}", summary.failures);
}
