//! Apply-link liveness check.

use async_trait::async_trait;
use jobsift_core::NormalizedPosting;
use jobsift_storage::HttpFetcher;
use tracing::debug;

#[async_trait]
pub trait LinkProbe: Send + Sync {
    /// Fetches `url` and reports whether the page mentions applying.
    async fn has_apply_marker(&self, source_id: &str, url: &str) -> bool;
}

#[async_trait]
impl LinkProbe for HttpFetcher {
    async fn has_apply_marker(&self, source_id: &str, url: &str) -> bool {
        match self.get(source_id, url).await {
            Ok(resp) => resp.text().to_lowercase().contains("apply"),
            Err(err) => {
                debug!(source_id, url, error = %err, "apply link probe failed");
                false
            }
        }
    }
}

pub fn unverified_note(url: &str) -> String {
    format!("apply link unverified: {url}")
}

/// Keeps the posting as-is when its link answers with an apply marker;
/// otherwise returns a copy with the link cleared and a note recording it.
/// Postings without a link have nothing to verify.
pub async fn verify_apply_link(posting: NormalizedPosting, probe: &dyn LinkProbe) -> NormalizedPosting {
    let link = posting.apply_link.trim();
    if link.is_empty() {
        return posting;
    }
    let probeable = url::Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if probeable && probe.has_apply_marker(&posting.company, link).await {
        return posting;
    }
    let note = unverified_note(link);
    posting.with_cleared_apply_link(note)
}
