//! Per-tier append-only CSV record set.

use std::path::{Path, PathBuf};

use jobsift_core::canonical::content_hash;
use jobsift_core::{DedupeKey, NormalizedPosting};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dedupe::Deduplicator;
use crate::{atomic_write, read_if_exists, StoreError};

pub const STORE_COLUMNS: [&str; 10] = [
    "Tier",
    "Company",
    "Role Category",
    "Job Title",
    "Location",
    "Job ID/Req ID",
    "Direct Apply Link",
    "Posted/Updated Timestamp (ISO)",
    "Work Model",
    "Notes",
];

/// One persisted row, column order matching [`STORE_COLUMNS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredRow {
    #[serde(rename = "Tier")]
    pub tier: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Role Category")]
    pub role_category: String,
    #[serde(rename = "Job Title")]
    pub title: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Job ID/Req ID")]
    pub stable_id: String,
    #[serde(rename = "Direct Apply Link")]
    pub apply_link: String,
    #[serde(rename = "Posted/Updated Timestamp (ISO)")]
    pub posted: String,
    #[serde(rename = "Work Model")]
    pub work_model: String,
    #[serde(rename = "Notes")]
    pub notes: String,
}

impl StoredRow {
    pub fn dedupe_key(&self) -> DedupeKey {
        DedupeKey::new(&self.company, &self.stable_id)
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.title, &self.company, &self.location)
    }
}

impl From<&NormalizedPosting> for StoredRow {
    fn from(p: &NormalizedPosting) -> Self {
        Self {
            tier: p.tier.to_string(),
            company: p.company.clone(),
            role_category: p.role_category.to_string(),
            title: p.title.clone(),
            location: p.location.clone(),
            stable_id: p.stable_id.clone(),
            apply_link: p.apply_link.clone(),
            posted: p.posted.to_string(),
            work_model: p.work_model.clone(),
            notes: p.notes_text(),
        }
    }
}

/// Append-only store for one tier. Single writer: concurrent runs against the
/// same file are not supported.
#[derive(Debug, Clone)]
pub struct PostingStore {
    path: PathBuf,
}

impl PostingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn rows(&self) -> Result<Vec<StoredRow>, StoreError> {
        match read_if_exists(&self.path).await? {
            Some(bytes) => parse_rows(&self.path, &bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Appends the postings whose (company, stable id) is not yet stored.
    ///
    /// Reads the existing file, drops known and intra-batch duplicates, then
    /// swaps in existing + new rows atomically. Either every new row lands or
    /// none do. Creates the file with a header when missing. Returns the
    /// number of rows added.
    pub async fn add_batch(&self, batch: &[NormalizedPosting]) -> Result<usize, StoreError> {
        let existing = read_if_exists(&self.path).await?;
        let rows = match &existing {
            Some(bytes) => parse_rows(&self.path, bytes)?,
            None => Vec::new(),
        };
        let mut dedup = Deduplicator::from_existing(
            rows.iter().map(|r| (r.dedupe_key(), r.content_hash())),
        );
        let outcome = dedup.partition(batch.to_vec());

        let mut out = existing.unwrap_or_default();
        let needs_header = out.is_empty();
        if outcome.fresh.is_empty() && !needs_header {
            debug!(path = %self.path.display(), duplicates = outcome.duplicates, "no new rows");
            return Ok(0);
        }
        if !out.is_empty() && !out.ends_with(b"\n") {
            out.push(b'\n');
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(Vec::new());
        if needs_header && outcome.fresh.is_empty() {
            writer
                .write_record(STORE_COLUMNS)
                .map_err(|e| StoreError::csv(&self.path, e))?;
        }
        for posting in &outcome.fresh {
            writer
                .serialize(StoredRow::from(posting))
                .map_err(|e| StoreError::csv(&self.path, e))?;
        }
        let appended = writer
            .into_inner()
            .map_err(|e| StoreError::io(&self.path, e.into_error()))?;
        out.extend_from_slice(&appended);

        atomic_write(&self.path, &out).await?;
        debug!(
            path = %self.path.display(),
            added = outcome.fresh.len(),
            duplicates = outcome.duplicates,
            "appended postings"
        );
        Ok(outcome.fresh.len())
    }
}

fn parse_rows(path: &Path, bytes: &[u8]) -> Result<Vec<StoredRow>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    reader
        .deserialize::<StoredRow>()
        .map(|row| row.map_err(|e| StoreError::csv(path, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use jobsift_core::{PostedTimestamp, RoleCategory, Tier};
    use tempfile::tempdir;

    fn posting(company: &str, stable_id: &str, title: &str) -> NormalizedPosting {
        NormalizedPosting {
            tier: Tier(1),
            company: company.to_string(),
            role_category: RoleCategory::Intern,
            title: title.to_string(),
            location: "Seattle, WA".to_string(),
            stable_id: stable_id.to_string(),
            apply_link: "https://jobs.example.com/1".to_string(),
            posted: PostedTimestamp::Parsed(
                Utc.with_ymd_and_hms(2026, 2, 24, 10, 0, 0).single().unwrap(),
            ),
            work_model: "Hybrid".to_string(),
            notes: vec!["synthetic id (content hash)".to_string(), "x, y".to_string()],
        }
    }

    #[tokio::test]
    async fn creates_store_with_header_and_rows() {
        let dir = tempdir().expect("tempdir");
        let store = PostingStore::new(dir.path().join("tier1.csv"));

        let added = store
            .add_batch(&[posting("Acme", "1", "Software Engineer Intern")])
            .await
            .expect("add");
        assert_eq!(added, 1);

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with(&STORE_COLUMNS.join(",")));
        let rows = store.rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tier, "Tier 1");
        assert_eq!(rows[0].role_category, "Intern");
        assert_eq!(rows[0].posted, "2026-02-24T10:00:00Z");
        assert_eq!(rows[0].notes, "synthetic id (content hash); x, y");
    }

    #[tokio::test]
    async fn empty_batch_initializes_header_only() {
        let dir = tempdir().expect("tempdir");
        let store = PostingStore::new(dir.path().join("tier2.csv"));
        assert_eq!(store.add_batch(&[]).await.unwrap(), 0);
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.trim_end(), STORE_COLUMNS.join(","));
        assert!(store.rows().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_identical_batch_adds_nothing() {
        let dir = tempdir().expect("tempdir");
        let store = PostingStore::new(dir.path().join("tier1.csv"));
        let batch = vec![posting("Acme", "1", "A"), posting("Acme", "2", "B")];

        assert_eq!(store.add_batch(&batch).await.unwrap(), 2);
        let before = std::fs::read(store.path()).unwrap();
        assert_eq!(store.add_batch(&batch).await.unwrap(), 0);
        let after = std::fs::read(store.path()).unwrap();

        assert_eq!(before, after);
        assert_eq!(store.rows().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn appends_preserve_existing_rows_in_order() {
        let dir = tempdir().expect("tempdir");
        let store = PostingStore::new(dir.path().join("tier1.csv"));
        store.add_batch(&[posting("Acme", "1", "A")]).await.unwrap();
        let added = store
            .add_batch(&[posting("acme", "1", "A again"), posting("Acme", "9", "C")])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let ids: Vec<_> = store
            .rows()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.stable_id, r.title))
            .collect();
        assert_eq!(
            ids,
            vec![("1".to_string(), "A".to_string()), ("9".to_string(), "C".to_string())]
        );
    }

    #[tokio::test]
    async fn tolerates_store_without_trailing_newline() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tier1.csv");
        std::fs::write(
            &path,
            format!(
                "{}\nTier 1,Acme,Intern,A,\"Austin, TX\",1,,,,",
                STORE_COLUMNS.join(",")
            ),
        )
        .unwrap();
        let store = PostingStore::new(&path);
        assert_eq!(store.add_batch(&[posting("Acme", "2", "B")]).await.unwrap(), 1);
        let rows = store.rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].location, "Austin, TX");
    }

    #[tokio::test]
    async fn corrupt_store_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("tier1.csv");
        std::fs::write(&path, "Tier,Company\nTier 1,Acme,extra,fields\n").unwrap();
        let store = PostingStore::new(&path);
        assert!(matches!(
            store.add_batch(&[posting("Acme", "2", "B")]).await,
            Err(StoreError::Csv { .. })
        ));
    }
}
