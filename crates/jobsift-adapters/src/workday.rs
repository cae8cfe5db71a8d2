//! Workday CXS job search endpoint.

use async_trait::async_trait;
use jobsift_core::{CompanyRecord, RawPosting};
use jobsift_storage::HttpFetcher;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use url::Url;

use crate::{infer_work_model, AdapterError, SourceAdapter};

const PAGE_SIZE: usize = 20;
const MAX_PAGES: usize = 5;
const DEFAULT_SITE: &str = "External";

#[derive(Debug, Clone, Default)]
pub struct WorkdayAdapter {
    origin_override: Option<String>,
}

impl WorkdayAdapter {
    /// Sends CXS requests to `origin` instead of the company URL's origin.
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin_override: Some(origin.into().trim_end_matches('/').to_string()),
        }
    }
}

/// Where to POST searches and how to build public job links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkdaySite {
    pub origin: String,
    pub tenant: String,
    pub site: String,
}

impl WorkdaySite {
    pub fn from_company(company: &CompanyRecord) -> Result<Self, AdapterError> {
        let url = Url::parse(company.url.trim())
            .map_err(|e| AdapterError::config(company, format!("bad workday url: {e}")))?;
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        let tenant = company
            .tenant
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .or_else(|| {
                host.ends_with(".myworkdayjobs.com")
                    .then(|| host.split('.').next().unwrap_or_default().to_string())
                    .filter(|t| !t.is_empty())
            })
            .ok_or_else(|| AdapterError::config(company, "no workday tenant"))?;

        let site = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|seg| !seg.is_empty() && !is_locale(seg))
            .last()
            .unwrap_or(DEFAULT_SITE)
            .to_string();

        Ok(Self {
            origin: url.origin().ascii_serialization(),
            tenant,
            site,
        })
    }

    pub fn jobs_endpoint(&self) -> String {
        format!("{}/wday/cxs/{}/{}/jobs", self.origin, self.tenant, self.site)
    }

    pub fn job_link(&self, external_path: &str) -> String {
        if external_path.is_empty() {
            return String::new();
        }
        format!("{}/{}{}", self.origin, self.site, external_path)
    }
}

/// `en-US` style path prefixes.
fn is_locale(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 5
        && bytes[2] == b'-'
        && bytes[..2].iter().all(u8::is_ascii_lowercase)
        && bytes[3..].iter().all(u8::is_ascii_uppercase)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    applied_facets: JsonValue,
    limit: usize,
    offset: usize,
    search_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    total: Option<usize>,
    #[serde(default)]
    job_postings: Vec<JobPosting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobPosting {
    #[serde(default)]
    title: String,
    #[serde(default)]
    external_path: String,
    #[serde(default)]
    locations_text: String,
    #[serde(default)]
    posted_on: String,
    #[serde(default)]
    bullet_fields: Vec<JsonValue>,
}

/// Parses one CXS page. Returns the postings and the reported total.
pub fn parse_page(
    site: &WorkdaySite,
    payload: &JsonValue,
) -> Result<(Vec<RawPosting>, Option<usize>), AdapterError> {
    let page = SearchPage::deserialize(payload)
        .map_err(|e| AdapterError::Payload(format!("workday page: {e}")))?;
    let postings = page
        .job_postings
        .into_iter()
        .map(|job| {
            let req_id = job
                .bullet_fields
                .first()
                .and_then(|field| match field {
                    JsonValue::String(s) => Some(s.trim().to_string()),
                    JsonValue::Object(map) => map
                        .get("text")
                        .and_then(JsonValue::as_str)
                        .map(|s| s.trim().to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| job.external_path.clone());
            let location = job.locations_text.trim().to_string();
            RawPosting {
                id: req_id,
                title: job.title.trim().to_string(),
                work_model: infer_work_model(&location),
                location,
                apply_link: site.job_link(&job.external_path),
                posted: job.posted_on.trim().to_string(),
                description: String::new(),
            }
        })
        .collect();
    Ok((postings, page.total))
}

#[async_trait]
impl SourceAdapter for WorkdayAdapter {
    fn ats(&self) -> &'static str {
        "workday"
    }

    async fn fetch_postings(
        &self,
        http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        let mut site = WorkdaySite::from_company(company)?;
        let endpoint = match &self.origin_override {
            Some(origin) => format!("{origin}/wday/cxs/{}/{}/jobs", site.tenant, site.site),
            None => site.jobs_endpoint(),
        };
        if let Some(origin) = &self.origin_override {
            site.origin = origin.clone();
        }

        let mut postings = Vec::new();
        for page in 0..MAX_PAGES {
            let offset = page * PAGE_SIZE;
            let request = SearchRequest {
                applied_facets: JsonValue::Object(Default::default()),
                limit: PAGE_SIZE,
                offset,
                search_text: String::new(),
            };
            let payload: JsonValue = http.post_json(&company.company, &endpoint, &request).await?;
            let (batch, total) = parse_page(&site, &payload)?;
            let received = batch.len();
            postings.extend(batch);
            debug!(company = %company.company, page, received, "workday page");

            let exhausted = total.is_some_and(|t| offset + received >= t);
            if received < PAGE_SIZE || exhausted {
                break;
            }
        }
        Ok(postings)
    }
}
