//! Lever postings API.

use async_trait::async_trait;
use jobsift_core::{CompanyRecord, RawPosting};
use jobsift_storage::HttpFetcher;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{
    collapse_whitespace, html_to_text, infer_work_model, json_id, slug_from_url, AdapterError,
    SourceAdapter,
};

const DEFAULT_API_BASE: &str = "https://api.lever.co";

#[derive(Debug, Clone)]
pub struct LeverAdapter {
    api_base: String,
}

impl Default for LeverAdapter {
    fn default() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }
}

impl LeverAdapter {
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn postings_url(&self, org: &str) -> String {
        format!("{}/v0/postings/{org}?mode=json", self.api_base)
    }
}

pub fn org_slug(company: &CompanyRecord) -> Option<String> {
    company
        .org
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(|| slug_from_url(&company.url, &["lever.co"]))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Posting {
    id: Option<JsonValue>,
    #[serde(default)]
    text: String,
    hosted_url: Option<String>,
    apply_url: Option<String>,
    created_at: Option<JsonValue>,
    #[serde(default)]
    categories: Categories,
    workplace_type: Option<String>,
    description_plain: Option<String>,
    #[serde(default)]
    lists: Vec<PostingList>,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostingList {
    #[serde(default)]
    content: String,
}

pub fn parse_postings(payload: &JsonValue) -> Result<Vec<RawPosting>, AdapterError> {
    let postings = Vec::<Posting>::deserialize(payload)
        .map_err(|e| AdapterError::Payload(format!("lever postings: {e}")))?;
    Ok(postings.into_iter().map(into_raw).collect())
}

fn into_raw(posting: Posting) -> RawPosting {
    let location = posting
        .categories
        .location
        .map(|l| l.trim().to_string())
        .unwrap_or_default();
    let mut description = posting.description_plain.unwrap_or_default();
    for list in &posting.lists {
        description.push(' ');
        description.push_str(&html_to_text(&list.content));
    }
    let work_model = match posting.workplace_type.as_deref().map(str::to_ascii_lowercase) {
        Some(kind) if kind == "remote" => "Remote".to_string(),
        Some(kind) if kind == "hybrid" => "Hybrid".to_string(),
        Some(kind) if kind == "onsite" || kind == "on-site" => "Onsite".to_string(),
        _ => infer_work_model(&location),
    };
    RawPosting {
        id: json_id(posting.id.as_ref()),
        title: posting.text.trim().to_string(),
        location,
        apply_link: posting.hosted_url.or(posting.apply_url).unwrap_or_default(),
        // epoch milliseconds; the canonicalizer owns the conversion
        posted: json_id(posting.created_at.as_ref()),
        description: collapse_whitespace(&description),
        work_model,
    }
}

#[async_trait]
impl SourceAdapter for LeverAdapter {
    fn ats(&self) -> &'static str {
        "lever"
    }

    async fn fetch_postings(
        &self,
        http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        let org = org_slug(company)
            .ok_or_else(|| AdapterError::config(company, "no lever org slug"))?;
        let payload: JsonValue = http.get_json(&company.company, &self.postings_url(&org)).await?;
        parse_postings(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{company, read_fixture};
    use jobsift_storage::HttpClientConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_fixture_postings() {
        let payload: JsonValue =
            serde_json::from_str(&read_fixture("lever/postings.json")).expect("fixture json");
        let postings = parse_postings(&payload).expect("parse");
        assert_eq!(postings.len(), 2);

        let first = &postings[0];
        assert_eq!(first.id, "5ac21346-8e0c-4494-8e7a-3eb92ff77902");
        assert_eq!(first.location, "Austin, TX");
        assert_eq!(first.posted, "1771952400000");
        assert_eq!(first.work_model, "Hybrid");
        assert!(first.description.contains("1+ years of experience building services"));

        assert_eq!(postings[1].work_model, "Remote");
        assert_eq!(postings[1].title, "Software Engineering Co-op");
    }

    #[test]
    fn org_comes_from_jobs_url() {
        let record = company("lever", "https://jobs.lever.co/initech");
        assert_eq!(org_slug(&record).as_deref(), Some("initech"));
        assert_eq!(org_slug(&company("lever", "https://initech.com/careers")), None);
    }

    #[tokio::test]
    async fn scrape_fetches_postings_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/postings/initech"))
            .and(query_param("mode", "json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(read_fixture("lever/postings.json"), "application/json"),
            )
            .mount(&server)
            .await;

        let http = HttpFetcher::new(HttpClientConfig::default()).expect("client");
        let adapter = LeverAdapter::with_api_base(server.uri());
        let record = company("lever", "https://jobs.lever.co/initech");
        let postings = adapter.scrape(&http, &record).await.expect("scrape");
        assert_eq!(postings.len(), 2);
    }

    #[tokio::test]
    async fn malformed_payload_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/postings/initech"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"ok":false}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let http = HttpFetcher::new(HttpClientConfig::default()).expect("client");
        let adapter = LeverAdapter::with_api_base(server.uri());
        let record = company("lever", "https://jobs.lever.co/initech");
        assert!(adapter.scrape(&http, &record).await.expect("scrape").is_empty());
    }
}
