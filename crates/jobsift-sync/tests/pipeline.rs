use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use jobsift_adapters::{AdapterError, AdapterRegistry, GreenhouseAdapter, SourceAdapter};
use jobsift_core::{CompanyRecord, RawPosting};
use jobsift_storage::{FirstSeenLog, HttpFetcher, PostingStore, RunHistoryLog};
use jobsift_filters::LinkProbe;
use jobsift_sync::{SyncConfig, SyncPipeline, FIRST_SEEN_FILE, RUN_HISTORY_FILE};
use serde_json::{json, Value as JsonValue};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ONE_TIER_PLAN: &str = "tiers:\n  - tier: 1\n    companies: tier1.json\n    output: tier1.csv\n";

fn hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn board(apply_base: &str) -> JsonValue {
    json!({
        "jobs": [
            {
                "id": 1,
                "title": "Software Engineer Intern",
                "location": {"name": "Seattle, WA"},
                "absolute_url": format!("{apply_base}/jobs/1?gh_src=feed"),
                "updated_at": hours_ago(2),
                "content": "&lt;p&gt;0-1 years experience with Python.&lt;/p&gt;"
            },
            {
                "id": 2,
                "title": "Software Engineer",
                "location": {"name": "Berlin, Germany"},
                "absolute_url": format!("{apply_base}/jobs/2"),
                "updated_at": hours_ago(1),
                "content": ""
            }
        ]
    })
}

async fn greenhouse_server() -> MockServer {
    let server = MockServer::start().await;
    let body = board(&server.uri());
    Mock::given(method("GET"))
        .and(path("/v1/boards/acme/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn write_data(dir: &Path, plan: &str, companies: JsonValue) {
    std::fs::write(dir.join("tiers.yaml"), plan).unwrap();
    std::fs::write(dir.join("tier1.json"), companies.to_string()).unwrap();
}

fn acme() -> JsonValue {
    json!({"company": "Acme", "tier": 1, "ats": "greenhouse", "url": "https://boards.greenhouse.io/acme"})
}

fn pipeline(dir: &Path, server: &MockServer, verify_links: bool) -> SyncPipeline {
    let config = SyncConfig {
        data_dir: dir.to_path_buf(),
        verify_apply_links: verify_links,
        max_retries: 0,
        ..Default::default()
    };
    let mut registry = AdapterRegistry::builtin();
    registry.register(
        "greenhouse",
        Arc::new(GreenhouseAdapter::with_api_base(server.uri())),
    );
    SyncPipeline::new(config).expect("pipeline").with_registry(registry)
}

#[tokio::test]
async fn end_to_end_keeps_us_posting_and_drops_berlin() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    write_data(dir.path(), ONE_TIER_PLAN, json!([acme()]));

    let summary = pipeline(dir.path(), &server, false)
        .run_once(None)
        .await
        .expect("run");
    assert!(summary.is_success());
    let stats = &summary.tiers[0];
    assert_eq!((stats.scraped, stats.accepted, stats.added), (2, 1, 1));

    let rows = PostingStore::new(dir.path().join("tier1.csv")).rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tier, "Tier 1");
    assert_eq!(rows[0].company, "Acme");
    assert_eq!(rows[0].role_category, "Intern");
    assert_eq!(rows[0].location, "Seattle, WA");
    assert_eq!(rows[0].stable_id, "1");
    assert_eq!(rows[0].apply_link, format!("{}/jobs/1", server.uri()));
    assert!(rows[0].posted.ends_with('Z'));

    let history = RunHistoryLog::new(dir.path().join(RUN_HISTORY_FILE))
        .entries()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].scraped, history[0].accepted, history[0].added), (2, 1, 1));

    let first_seen = FirstSeenLog::new(dir.path().join(FIRST_SEEN_FILE))
        .entries()
        .await
        .unwrap();
    assert_eq!(first_seen.len(), 1);
    assert_eq!(first_seen[0].company, "Acme");
}

#[tokio::test]
async fn run_summary_serializes_for_json_output() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    write_data(dir.path(), ONE_TIER_PLAN, json!([acme()]));

    let summary = pipeline(dir.path(), &server, false)
        .run_once(None)
        .await
        .expect("run");
    let value = serde_json::to_value(&summary).expect("json");
    assert_eq!(value["run_id"], json!(summary.run_id.to_string()));
    assert_eq!(value["tiers"][0]["tier"], json!(1));
    assert_eq!(value["tiers"][0]["scraped"], json!(2));
    assert_eq!(value["tiers"][0]["added"], json!(1));
    assert_eq!(value["failed_tiers"], json!([]));
}

#[tokio::test]
async fn rerun_adds_nothing_and_leaves_store_untouched() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    write_data(dir.path(), ONE_TIER_PLAN, json!([acme()]));
    let pipeline = pipeline(dir.path(), &server, false);

    pipeline.run_once(None).await.expect("first run");
    let before = std::fs::read(dir.path().join("tier1.csv")).unwrap();

    let summary = pipeline.run_once(None).await.expect("second run");
    let after = std::fs::read(dir.path().join("tier1.csv")).unwrap();
    assert_eq!(before, after);
    assert_eq!(summary.tiers[0].added, 0);
    assert_eq!(summary.tiers[0].duplicates, 1);

    let history = RunHistoryLog::new(dir.path().join(RUN_HISTORY_FILE))
        .entries()
        .await
        .unwrap();
    assert_eq!(history.len(), 1, "same-day rerun replaces the row");
    assert_eq!(history[0].added, 0);
}

#[tokio::test]
async fn unknown_ats_is_skipped() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    write_data(
        dir.path(),
        ONE_TIER_PLAN,
        json!([
            {"company": "Globex", "tier": 1, "ats": "icims", "url": "https://careers.globex.com"},
            acme()
        ]),
    );

    let summary = pipeline(dir.path(), &server, false)
        .run_once(None)
        .await
        .expect("run");
    let stats = &summary.tiers[0];
    assert_eq!(stats.skipped_companies, 1);
    assert_eq!(stats.failed_companies, 0);
    assert_eq!(stats.added, 1);

    let first_seen = FirstSeenLog::new(dir.path().join(FIRST_SEEN_FILE))
        .entries()
        .await
        .unwrap();
    assert_eq!(first_seen.len(), 2);
}

struct Panicking;

#[async_trait]
impl SourceAdapter for Panicking {
    fn ats(&self) -> &'static str {
        "panicking"
    }

    async fn fetch_postings(
        &self,
        _http: &HttpFetcher,
        _company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        panic!("adapter bug");
    }
}

struct Misconfigured;

#[async_trait]
impl SourceAdapter for Misconfigured {
    fn ats(&self) -> &'static str {
        "misconfigured"
    }

    async fn fetch_postings(
        &self,
        _http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        Err(AdapterError::config(company, "no org slug"))
    }
}

#[tokio::test]
async fn failing_companies_do_not_abort_the_tier() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    write_data(
        dir.path(),
        ONE_TIER_PLAN,
        json!([
            {"company": "Boom", "tier": 1, "ats": "panicking", "url": "https://boom.example"},
            acme(),
            {"company": "Broken", "tier": 1, "ats": "misconfigured", "url": "https://broken.example"}
        ]),
    );

    let mut registry = AdapterRegistry::builtin();
    registry.register("greenhouse", Arc::new(GreenhouseAdapter::with_api_base(server.uri())));
    registry.register("panicking", Arc::new(Panicking));
    registry.register("misconfigured", Arc::new(Misconfigured));
    let config = SyncConfig {
        data_dir: dir.path().to_path_buf(),
        verify_apply_links: false,
        concurrency: 1,
        ..Default::default()
    };
    let summary = SyncPipeline::new(config)
        .expect("pipeline")
        .with_registry(registry)
        .run_once(None)
        .await
        .expect("run");

    let stats = &summary.tiers[0];
    assert_eq!(stats.failed_companies, 2);
    assert_eq!(stats.added, 1);
}

#[tokio::test]
async fn dead_apply_links_are_cleared_and_noted() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    Mock::given(method("GET"))
        .and(path("/jobs/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("This position has been filled."))
        .mount(&server)
        .await;
    write_data(dir.path(), ONE_TIER_PLAN, json!([acme()]));

    pipeline(dir.path(), &server, true)
        .run_once(None)
        .await
        .expect("run");

    let rows = PostingStore::new(dir.path().join("tier1.csv")).rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].apply_link, "");
    assert_eq!(
        rows[0].notes,
        format!("apply link unverified: {}/jobs/1", server.uri())
    );
}

struct AlwaysLive;

#[async_trait]
impl LinkProbe for AlwaysLive {
    async fn has_apply_marker(&self, _source_id: &str, _url: &str) -> bool {
        true
    }
}

#[tokio::test]
async fn injected_liveness_check_replaces_http_fetch() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    write_data(dir.path(), ONE_TIER_PLAN, json!([acme()]));

    pipeline(dir.path(), &server, true)
        .with_link_probe(Some(Arc::new(AlwaysLive) as Arc<dyn LinkProbe>))
        .run_once(None)
        .await
        .expect("run");

    let rows = PostingStore::new(dir.path().join("tier1.csv")).rows().await.unwrap();
    assert_eq!(rows[0].apply_link, format!("{}/jobs/1", server.uri()));
    assert_eq!(rows[0].notes, "");
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.url.path() != "/jobs/1"));
}

#[tokio::test]
async fn missing_company_list_fails_before_scraping() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    std::fs::write(dir.path().join("tiers.yaml"), ONE_TIER_PLAN).unwrap();

    let result = pipeline(dir.path(), &server, false).run_once(None).await;
    assert!(result.is_err());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert!(!dir.path().join("tier1.csv").exists());
}

#[tokio::test]
async fn store_failure_marks_tier_failed_and_other_tiers_continue() {
    let dir = tempdir().expect("tempdir");
    let server = greenhouse_server().await;
    let plan = "tiers:\n  - tier: 1\n    companies: tier1.json\n    output: blocked/tier1.csv\n  - tier: 2\n    companies: tier2.json\n    output: tier2.csv\n";
    write_data(dir.path(), plan, json!([acme()]));
    std::fs::write(dir.path().join("tier2.json"), "[]").unwrap();
    // a regular file where the store's directory should be
    std::fs::write(dir.path().join("blocked"), "").unwrap();

    let summary = pipeline(dir.path(), &server, false)
        .run_once(None)
        .await
        .expect("run");
    assert!(!summary.is_success());
    assert_eq!(summary.failed_tiers.len(), 1);
    assert_eq!(summary.failed_tiers[0].tier.0, 1);
    assert_eq!(summary.tiers.len(), 1);
    assert_eq!(summary.tiers[0].tier.0, 2);
    assert!(dir.path().join("tier2.csv").exists());
}
