//! Core domain model for jobsift: company config, raw and normalized postings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod canonical;

pub const CRATE_NAME: &str = "jobsift-core";

/// Ordinal grouping of companies; each tier is run and persisted independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(pub u32);

impl Default for Tier {
    fn default() -> Self {
        Tier(1)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier {}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid tier label {0:?}")]
pub struct TierParseError(pub String);

impl FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("tier") => trimmed[4..].trim(),
            _ => trimmed,
        };
        digits
            .parse::<u32>()
            .map(Tier)
            .map_err(|_| TierParseError(s.to_string()))
    }
}

/// One configured company. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompanyRecord {
    pub company: String,
    pub tier: Tier,
    pub ats: String,
    pub url: String,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
}

/// Minimally-structured adapter output. Nothing here is trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPosting {
    pub id: String,
    pub title: String,
    pub location: String,
    pub apply_link: String,
    /// ISO-8601, epoch digits, or free text such as "Posted 2 Days Ago".
    pub posted: String,
    pub description: String,
    pub work_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleCategory {
    Intern,
    NewGrad,
    EntryLevel,
    CoOp,
    Junior,
}

impl RoleCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleCategory::Intern => "Intern",
            RoleCategory::NewGrad => "New-Grad",
            RoleCategory::EntryLevel => "Entry-Level",
            RoleCategory::CoOp => "Co-op",
            RoleCategory::Junior => "Junior",
        }
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '_'], "-");
        match key.as_str() {
            "intern" => Ok(RoleCategory::Intern),
            "new-grad" => Ok(RoleCategory::NewGrad),
            "entry-level" => Ok(RoleCategory::EntryLevel),
            "co-op" => Ok(RoleCategory::CoOp),
            "junior" => Ok(RoleCategory::Junior),
            _ => Err(format!("unknown role category {s:?}")),
        }
    }
}

/// Posted time after normalization. Unparseable input is kept verbatim so the
/// freshness gate can still look for phrases like "today".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostedTimestamp {
    Parsed(DateTime<Utc>),
    Unparsed(String),
}

impl PostedTimestamp {
    pub fn parsed(&self) -> Option<DateTime<Utc>> {
        match self {
            PostedTimestamp::Parsed(at) => Some(*at),
            PostedTimestamp::Unparsed(_) => None,
        }
    }
}

impl fmt::Display for PostedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostedTimestamp::Parsed(at) => {
                f.write_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            PostedTimestamp::Unparsed(text) => f.write_str(text),
        }
    }
}

/// Canonical record; the unit that gets persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPosting {
    pub tier: Tier,
    pub company: String,
    pub role_category: RoleCategory,
    pub title: String,
    pub location: String,
    pub stable_id: String,
    pub apply_link: String,
    pub posted: PostedTimestamp,
    pub work_model: String,
    pub notes: Vec<String>,
}

impl NormalizedPosting {
    pub fn dedupe_key(&self) -> DedupeKey {
        DedupeKey::new(&self.company, &self.stable_id)
    }

    pub fn content_hash(&self) -> String {
        canonical::content_hash(&self.title, &self.company, &self.location)
    }

    pub fn notes_text(&self) -> String {
        self.notes.join("; ")
    }

    /// Returns a copy without an apply link, annotated with `note`.
    pub fn with_cleared_apply_link(&self, note: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.apply_link.clear();
        next.notes.push(note.into());
        next
    }
}

/// Primary persistence key: (company, stable id). Company is compared
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupeKey {
    pub company: String,
    pub stable_id: String,
}

impl DedupeKey {
    pub fn new(company: &str, stable_id: &str) -> Self {
        Self {
            company: company.trim().to_lowercase(),
            stable_id: stable_id.trim().to_string(),
        }
    }
}

/// Counts recorded per tier per run. Serialized as part of the JSON run
/// summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierRunStats {
    pub tier: Tier,
    pub scraped: usize,
    pub accepted: usize,
    pub added: usize,
    pub duplicates: usize,
    pub failed_companies: usize,
    pub skipped_companies: usize,
}
