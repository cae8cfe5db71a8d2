//! Source adapter contract, the static ATS registry and the built-in adapters.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use jobsift_core::{CompanyRecord, RawPosting};
use jobsift_storage::{FetchError, HttpFetcher};
use scraper::Html;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

pub mod graphql;
pub mod greenhouse;
pub mod html;
pub mod lever;
pub mod workday;

pub use graphql::GraphqlAdapter;
pub use greenhouse::GreenhouseAdapter;
pub use html::HtmlAdapter;
pub use lever::LeverAdapter;
pub use workday::WorkdayAdapter;

pub const CRATE_NAME: &str = "jobsift-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unexpected payload: {0}")]
    Payload(String),
    #[error("cannot scrape {company}: {message}")]
    Config { company: String, message: String },
}

impl AdapterError {
    pub fn config(company: &CompanyRecord, message: impl Into<String>) -> Self {
        AdapterError::Config {
            company: company.company.clone(),
            message: message.into(),
        }
    }

    /// Network and payload problems degrade to an empty result; configuration
    /// problems are reported to the orchestrator.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AdapterError::Fetch(_) | AdapterError::Payload(_))
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn ats(&self) -> &'static str;

    /// Adapter-specific fetch. May fail with any [`AdapterError`].
    async fn fetch_postings(
        &self,
        http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError>;

    /// Fetch with source errors folded into an empty result.
    async fn scrape(
        &self,
        http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        match self.fetch_postings(http, company).await {
            Err(err) if err.is_recoverable() => {
                warn!(
                    company = %company.company,
                    ats = %company.ats,
                    error = %err,
                    "source error; treating as no postings"
                );
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

/// Tag → adapter map built once at startup. Lookups are case-insensitive.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("greenhouse", Arc::new(GreenhouseAdapter::default()));
        registry.register("lever", Arc::new(LeverAdapter::default()));
        registry.register("workday", Arc::new(WorkdayAdapter::default()));
        let graphql: Arc<dyn SourceAdapter> = Arc::new(GraphqlAdapter::default());
        registry.register("graphql", graphql.clone());
        registry.register("meta", graphql);
        let generic: Arc<dyn SourceAdapter> = Arc::new(HtmlAdapter::generic());
        registry.register("html", generic.clone());
        registry.register("site_html", generic);
        registry.register("successfactors", Arc::new(HtmlAdapter::successfactors()));
        registry
    }

    pub fn register(&mut self, tag: &str, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(normalize_tag(tag), adapter);
    }

    pub fn resolve(&self, tag: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&normalize_tag(tag)).cloned()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_ascii_lowercase()
}

pub(crate) fn text_or_none(value: &str) -> Option<String> {
    let collapsed = collapse_whitespace(value);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Flattens an HTML fragment to whitespace-collapsed text.
pub(crate) fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return collapse_whitespace(fragment);
    }
    let parsed = Html::parse_fragment(fragment);
    let text = parsed.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Renders a JSON id that may arrive as a number or a string.
pub(crate) fn json_id(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.trim().to_string(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Best-effort work model from free text.
pub(crate) fn infer_work_model(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    if lower.contains("hybrid") {
        "Hybrid".to_string()
    } else if lower.contains("remote") {
        "Remote".to_string()
    } else if lower.contains("on-site") || lower.contains("onsite") || lower.contains("in office") {
        "Onsite".to_string()
    } else {
        String::new()
    }
}

/// First non-empty path segment of a URL on one of `hosts`.
pub(crate) fn slug_from_url(raw: &str, hosts: &[&str]) -> Option<String> {
    let url = url::Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    if !hosts.iter().any(|h| host == *h || host.ends_with(&format!(".{h}"))) {
        return None;
    }
    url.path_segments()?
        .find(|seg| !seg.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    use jobsift_core::{CompanyRecord, Tier};

    pub fn fixture_path(rel: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures")
            .join(rel)
    }

    pub fn read_fixture(rel: &str) -> String {
        std::fs::read_to_string(fixture_path(rel)).expect("read fixture")
    }

    pub fn company(ats: &str, url: &str) -> CompanyRecord {
        CompanyRecord {
            company: "Acme".to_string(),
            tier: Tier(1),
            ats: ats.to_string(),
            url: url.to_string(),
            org: None,
            tenant: None,
        }
    }
}
