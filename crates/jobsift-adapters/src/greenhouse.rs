//! Greenhouse job board API.

use async_trait::async_trait;
use jobsift_core::{CompanyRecord, RawPosting};
use jobsift_storage::HttpFetcher;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{html_to_text, infer_work_model, json_id, slug_from_url, AdapterError, SourceAdapter};

const DEFAULT_API_BASE: &str = "https://boards-api.greenhouse.io";

#[derive(Debug, Clone)]
pub struct GreenhouseAdapter {
    api_base: String,
}

impl Default for GreenhouseAdapter {
    fn default() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }
}

impl GreenhouseAdapter {
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn jobs_url(&self, board: &str) -> String {
        format!("{}/v1/boards/{board}/jobs?content=true", self.api_base)
    }
}

/// Board token: the `org` field, else `?for=` on embed URLs, else the first
/// path segment of a greenhouse.io URL.
pub fn board_token(company: &CompanyRecord) -> Option<String> {
    if let Some(org) = company.org.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return Some(org.to_string());
    }
    if let Ok(url) = url::Url::parse(company.url.trim()) {
        if let Some((_, value)) = url.query_pairs().find(|(k, _)| k == "for") {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    slug_from_url(&company.url, &["greenhouse.io"]).filter(|slug| slug != "embed")
}

#[derive(Debug, Deserialize)]
struct Board {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: Option<JsonValue>,
    #[serde(default)]
    title: String,
    location: Option<Location>,
    absolute_url: Option<String>,
    updated_at: Option<String>,
    created_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: Option<String>,
}

pub fn parse_board(payload: &JsonValue) -> Result<Vec<RawPosting>, AdapterError> {
    let board = Board::deserialize(payload)
        .map_err(|e| AdapterError::Payload(format!("greenhouse board: {e}")))?;
    Ok(board.jobs.into_iter().map(into_raw).collect())
}

fn into_raw(job: Job) -> RawPosting {
    let location = job
        .location
        .and_then(|l| l.name)
        .map(|n| n.trim().to_string())
        .unwrap_or_default();
    // `content` arrives entity-escaped, so it takes two passes to reach text.
    let description = job
        .content
        .as_deref()
        .map(|c| html_to_text(&html_to_text(c)))
        .unwrap_or_default();
    RawPosting {
        id: json_id(job.id.as_ref()),
        title: job.title.trim().to_string(),
        work_model: infer_work_model(&location),
        location,
        apply_link: job.absolute_url.unwrap_or_default(),
        posted: job.updated_at.or(job.created_at).unwrap_or_default(),
        description,
    }
}

#[async_trait]
impl SourceAdapter for GreenhouseAdapter {
    fn ats(&self) -> &'static str {
        "greenhouse"
    }

    async fn fetch_postings(
        &self,
        http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        let board = board_token(company)
            .ok_or_else(|| AdapterError::config(company, "no greenhouse board token"))?;
        let payload: JsonValue = http.get_json(&company.company, &self.jobs_url(&board)).await?;
        parse_board(&payload)
    }
}
