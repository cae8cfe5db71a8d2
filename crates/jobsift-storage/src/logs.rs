//! First-seen and run-history logs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use jobsift_core::{Tier, TierRunStats};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{atomic_write, read_if_exists, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstSeenEntry {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Tier")]
    pub tier: String,
    #[serde(rename = "Company")]
    pub company: String,
}

/// One row per (tier, company) ever configured; rows are written once.
#[derive(Debug, Clone)]
pub struct FirstSeenLog {
    path: PathBuf,
}

impl FirstSeenLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entries(&self) -> Result<Vec<FirstSeenEntry>, StoreError> {
        read_entries(&self.path).await
    }

    /// Records companies not yet seen for `tier`. Returns how many were new.
    pub async fn record(
        &self,
        at: DateTime<Utc>,
        tier: Tier,
        companies: &[String],
    ) -> Result<usize, StoreError> {
        let mut entries = self.entries().await?;
        let mut seen: HashSet<(Option<Tier>, String)> = entries
            .iter()
            .map(|e| (e.tier.parse::<Tier>().ok(), e.company.trim().to_lowercase()))
            .collect();

        let timestamp = format_timestamp(at);
        let before = entries.len();
        for company in companies {
            if seen.insert((Some(tier), company.trim().to_lowercase())) {
                entries.push(FirstSeenEntry {
                    timestamp: timestamp.clone(),
                    tier: tier.to_string(),
                    company: company.trim().to_string(),
                });
            }
        }
        let added = entries.len() - before;
        if added > 0 {
            write_entries(&self.path, &entries).await?;
        }
        Ok(added)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHistoryEntry {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Tier")]
    pub tier: String,
    #[serde(rename = "Scraped")]
    pub scraped: usize,
    #[serde(rename = "Accepted")]
    pub accepted: usize,
    #[serde(rename = "Added")]
    pub added: usize,
}

impl RunHistoryEntry {
    fn day(&self) -> Option<NaiveDate> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .ok()
            .or_else(|| {
                self.timestamp
                    .get(..10)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            })
    }
}

/// Per-run, per-tier counts. A rerun on the same UTC day replaces that day's
/// row for the tier; older rows are never touched.
#[derive(Debug, Clone)]
pub struct RunHistoryLog {
    path: PathBuf,
}

impl RunHistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entries(&self) -> Result<Vec<RunHistoryEntry>, StoreError> {
        read_entries(&self.path).await
    }

    pub async fn record(&self, at: DateTime<Utc>, stats: &TierRunStats) -> Result<(), StoreError> {
        let today = at.date_naive();
        let mut entries: Vec<RunHistoryEntry> = self
            .entries()
            .await?
            .into_iter()
            .filter(|e| !(e.day() == Some(today) && e.tier.parse::<Tier>().ok() == Some(stats.tier)))
            .collect();
        entries.push(RunHistoryEntry {
            timestamp: format_timestamp(at),
            tier: stats.tier.to_string(),
            scraped: stats.scraped,
            accepted: stats.accepted,
            added: stats.added,
        });
        write_entries(&self.path, &entries).await
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn read_entries<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let Some(bytes) = read_if_exists(path).await? else {
        return Ok(Vec::new());
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes.as_slice());
    reader
        .deserialize::<T>()
        .map(|row| row.map_err(|e| StoreError::csv(path, e)))
        .collect()
}

async fn write_entries<T: Serialize>(path: &Path, entries: &[T]) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for entry in entries {
        writer.serialize(entry).map_err(|e| StoreError::csv(path, e))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::io(path, e.into_error()))?;
    atomic_write(path, &bytes).await
}
