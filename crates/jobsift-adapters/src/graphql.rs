//! GraphQL job search (Meta careers shape).

use async_trait::async_trait;
use jobsift_core::{CompanyRecord, RawPosting};
use jobsift_storage::HttpFetcher;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::{infer_work_model, json_id, AdapterError, SourceAdapter};

pub const DEFAULT_ENDPOINT: &str = "https://www.metacareers.com/graphql";
const PAGE_SIZE: usize = 50;
const MAX_PAGES: usize = 3;

const JOB_SEARCH_QUERY: &str = "query JobSearchResults($first: Int!, $after: String, $filters: JobSearchFilters) { \
jobs(first: $first, after: $after, filters: $filters) { \
edges { node { id title workLocation url datePosted } } \
pageInfo { hasNextPage endCursor } } }";

#[derive(Debug, Clone, Default)]
pub struct GraphqlAdapter {
    endpoint_override: Option<String>,
}

impl GraphqlAdapter {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint_override: Some(endpoint.into()),
        }
    }

    pub fn endpoint_for(&self, company: &CompanyRecord) -> String {
        if let Some(endpoint) = &self.endpoint_override {
            return endpoint.clone();
        }
        let url = company.url.trim();
        if url.trim_end_matches('/').ends_with("/graphql") {
            url.to_string()
        } else {
            DEFAULT_ENDPOINT.to_string()
        }
    }
}

fn search_payload(after: Option<&str>) -> JsonValue {
    json!({
        "operationName": "JobSearchResults",
        "query": JOB_SEARCH_QUERY,
        "variables": {
            "first": PAGE_SIZE,
            "after": after,
            "filters": { "country": "US" },
        },
    })
}

#[derive(Debug, Deserialize)]
struct Response {
    data: Option<Data>,
    #[serde(default)]
    errors: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct Data {
    jobs: Option<Jobs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Jobs {
    #[serde(default)]
    edges: Vec<Edge>,
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: Option<Node>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    id: Option<JsonValue>,
    #[serde(default)]
    title: String,
    work_location: Option<String>,
    url: Option<String>,
    date_posted: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Parses one result page. Returns the postings and the next cursor, if any.
pub fn parse_page(payload: &JsonValue) -> Result<(Vec<RawPosting>, Option<String>), AdapterError> {
    let response = Response::deserialize(payload)
        .map_err(|e| AdapterError::Payload(format!("graphql response: {e}")))?;
    let Some(jobs) = response.data.and_then(|d| d.jobs) else {
        return Err(AdapterError::Payload(format!(
            "graphql response without jobs ({} errors)",
            response.errors.len()
        )));
    };

    let postings = jobs
        .edges
        .into_iter()
        .filter_map(|edge| edge.node)
        .map(|node| {
            let location = node.work_location.unwrap_or_default().trim().to_string();
            RawPosting {
                id: json_id(node.id.as_ref()),
                title: node.title.trim().to_string(),
                work_model: infer_work_model(&location),
                location,
                apply_link: node.url.unwrap_or_default(),
                posted: json_id(node.date_posted.as_ref()),
                description: String::new(),
            }
        })
        .collect();

    let next = jobs
        .page_info
        .filter(|info| info.has_next_page)
        .and_then(|info| info.end_cursor)
        .filter(|cursor| !cursor.is_empty());
    Ok((postings, next))
}

#[async_trait]
impl SourceAdapter for GraphqlAdapter {
    fn ats(&self) -> &'static str {
        "graphql"
    }

    async fn fetch_postings(
        &self,
        http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        let endpoint = self.endpoint_for(company);
        let mut postings = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let payload: JsonValue = http
                .post_json(&company.company, &endpoint, &search_payload(cursor.as_deref()))
                .await?;
            let (batch, next) = parse_page(&payload)?;
            postings.extend(batch);
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(postings)
    }
}
