//! Gating and normalization of raw adapter output.
//!
//! Gates run in a fixed order and stop at the first failure: US location,
//! freshness, visa/clearance restrictions, then seniority and experience.
//! Survivors get a role category, a stable id and a canonical apply link.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use jobsift_core::canonical::{
    canonicalize_url, normalize_timestamp, resolve_link, stable_id, SYNTHETIC_ID_NOTE,
};
use jobsift_core::{CompanyRecord, NormalizedPosting, RawPosting};
use thiserror::Error;
use tracing::debug;

pub mod gates;
pub mod liveness;
pub mod role;

pub use liveness::{unverified_note, verify_apply_link, LinkProbe};
pub use role::infer_role;

pub const CRATE_NAME: &str = "jobsift-filters";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    pub freshness_hours: i64,
    pub max_experience_years: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            freshness_hours: 24,
            max_experience_years: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("location is not in the US")]
    NotUs,
    #[error("posting is older than the freshness window")]
    Stale,
    #[error("sponsorship, citizenship or clearance restriction")]
    Restricted,
    #[error("senior title")]
    SeniorTitle,
    #[error("requires at least {min_years} years of experience")]
    ExperienceAboveCeiling { min_years: u32 },
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::NotUs => "not_us",
            Rejection::Stale => "stale",
            Rejection::Restricted => "restricted",
            Rejection::SeniorTitle => "senior_title",
            Rejection::ExperienceAboveCeiling { .. } => "experience",
        }
    }
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub kept: Vec<NormalizedPosting>,
    pub rejected: BTreeMap<&'static str, usize>,
}

impl FilterOutcome {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    config: FilterConfig,
}

impl FilterPipeline {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        company: &CompanyRecord,
        raw: &RawPosting,
        now: DateTime<Utc>,
    ) -> Result<NormalizedPosting, Rejection> {
        let title = raw.title.trim();
        let location = raw.location.trim();

        if !gates::is_us_location(location) {
            return Err(Rejection::NotUs);
        }

        let posted = normalize_timestamp(&raw.posted, now);
        let window = Duration::hours(self.config.freshness_hours);
        if !gates::is_fresh(&posted, now, window) {
            return Err(Rejection::Stale);
        }

        if gates::is_restricted(title, &raw.description) {
            return Err(Rejection::Restricted);
        }

        if gates::is_senior_title(title) {
            return Err(Rejection::SeniorTitle);
        }
        if let Some(min_years) = gates::min_required_years(&raw.description) {
            if min_years > self.config.max_experience_years {
                return Err(Rejection::ExperienceAboveCeiling { min_years });
            }
        }

        let id = stable_id(&raw.id, title, &company.company, location);
        let mut notes = Vec::new();
        if id.synthetic {
            notes.push(SYNTHETIC_ID_NOTE.to_string());
        }

        Ok(NormalizedPosting {
            tier: company.tier,
            company: company.company.trim().to_string(),
            role_category: infer_role(title, &raw.description),
            title: title.to_string(),
            location: location.to_string(),
            stable_id: id.value,
            apply_link: canonicalize_url(&resolve_link(&company.url, &raw.apply_link)),
            posted,
            work_model: raw.work_model.trim().to_string(),
            notes,
        })
    }

    /// Runs every raw posting of one company through [`Self::evaluate`].
    pub fn apply(
        &self,
        company: &CompanyRecord,
        raws: &[RawPosting],
        now: DateTime<Utc>,
    ) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for raw in raws {
            match self.evaluate(company, raw, now) {
                Ok(posting) => outcome.kept.push(posting),
                Err(rejection) => {
                    debug!(
                        company = %company.company,
                        ats = %company.ats,
                        title = %raw.title,
                        reason = rejection.reason(),
                        "rejected posting"
                    );
                    *outcome.rejected.entry(rejection.reason()).or_default() += 1;
                }
            }
        }
        if !outcome.rejected.is_empty() {
            debug!(
                company = %company.company,
                ats = %company.ats,
                kept = outcome.kept.len(),
                rejected = ?outcome.rejected,
                "filter tally"
            );
        }
        outcome
    }
}
