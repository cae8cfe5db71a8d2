//! Generic career-page scraping for sites without a JSON API.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use jobsift_core::{CompanyRecord, RawPosting};
use jobsift_storage::HttpFetcher;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::{collapse_whitespace, infer_work_model, text_or_none, AdapterError, SourceAdapter};

static POSTED_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bposted\s+(?:on\s+)?([^|•\n]{1,40}?)\s*(?:$|[|•\n])").expect("valid regex")
});

const CARD_TAGS: [&str; 6] = ["li", "tr", "div", "article", "section", "dd"];
const CARD_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct HtmlAdapter {
    ats: &'static str,
    keywords: &'static [&'static str],
    min_text_len: usize,
}

impl HtmlAdapter {
    pub fn generic() -> Self {
        Self {
            ats: "html",
            keywords: &["job", "apply", "opening", "position", "careers/search"],
            min_text_len: 4,
        }
    }

    pub fn successfactors() -> Self {
        Self {
            ats: "successfactors",
            keywords: &["job", "career_job_req_id", "jobreq"],
            min_text_len: 5,
        }
    }

    fn is_job_link(&self, text: &str, href: &str) -> bool {
        if text.chars().count() < self.min_text_len {
            return false;
        }
        let href_lower = href.to_ascii_lowercase();
        if href_lower.starts_with('#')
            || href_lower.starts_with("mailto:")
            || href_lower.starts_with("javascript:")
            || href_lower.starts_with("tel:")
        {
            return false;
        }
        let text_lower = text.to_lowercase();
        self.keywords
            .iter()
            .any(|kw| href_lower.contains(kw) || text_lower.contains(kw))
    }

    /// Extracts job anchors from a listing page. Listing-level links such as
    /// "View all jobs" are dropped when their href repeats.
    pub fn parse_listing(&self, body: &str) -> Vec<RawPosting> {
        let document = Html::parse_document(body);
        let Ok(anchors) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut postings = Vec::new();
        for anchor in document.select(&anchors) {
            let href = anchor.value().attr("href").unwrap_or_default().trim();
            let title = collapse_whitespace(&anchor.text().collect::<String>());
            if href.is_empty() || !self.is_job_link(&title, href) {
                continue;
            }
            if !seen.insert(href.to_string()) {
                continue;
            }
            if is_listing_link(&title) {
                continue;
            }

            let card = enclosing_card(anchor);
            let location = card
                .and_then(card_location)
                .or_else(|| anchor.value().attr("data-location").and_then(text_or_none))
                .unwrap_or_default();
            let posted = card.and_then(card_posted).unwrap_or_default();
            postings.push(RawPosting {
                id: String::new(),
                title,
                work_model: infer_work_model(&location),
                location,
                apply_link: href.to_string(),
                posted,
                description: String::new(),
            });
        }
        postings
    }
}

fn is_listing_link(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.starts_with("view all") || lower.starts_with("see all") || lower == "jobs"
}

fn enclosing_card(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(CARD_DEPTH)
        .find(|el| CARD_TAGS.contains(&el.value().name()))
}

fn card_location(card: ElementRef<'_>) -> Option<String> {
    let selector =
        Selector::parse(".location, .job-location, [data-location], [class*=\"location\"]").ok()?;
    let element = card.select(&selector).next()?;
    element
        .value()
        .attr("data-location")
        .and_then(text_or_none)
        .or_else(|| text_or_none(&element.text().collect::<String>()))
}

fn card_posted(card: ElementRef<'_>) -> Option<String> {
    if let Ok(selector) = Selector::parse("time[datetime]") {
        if let Some(datetime) = card
            .select(&selector)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(text_or_none)
        {
            return Some(datetime);
        }
    }
    let text = card.text().collect::<Vec<_>>().join("\n");
    POSTED_TEXT
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| text_or_none(m.as_str()))
}

#[async_trait]
impl SourceAdapter for HtmlAdapter {
    fn ats(&self) -> &'static str {
        self.ats
    }

    async fn fetch_postings(
        &self,
        http: &HttpFetcher,
        company: &CompanyRecord,
    ) -> Result<Vec<RawPosting>, AdapterError> {
        let response = http.get(&company.company, company.url.trim()).await?;
        Ok(self.parse_listing(&response.text()))
    }
}
