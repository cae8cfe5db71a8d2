//! Dedupe decisions against persisted history.
//!
//! (company, stable id) decides membership. The content hash is only
//! reported: two rows sharing a hash but not a stable id are both kept.

use std::collections::{HashMap, HashSet};

use jobsift_core::{DedupeKey, NormalizedPosting};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    New,
    Duplicate,
}

#[derive(Debug, Default)]
pub struct DedupeOutcome {
    pub fresh: Vec<NormalizedPosting>,
    pub duplicates: usize,
    pub content_hash_collisions: usize,
}

#[derive(Debug, Default)]
pub struct Deduplicator {
    keys: HashSet<DedupeKey>,
    hashes: HashMap<String, DedupeKey>,
}

impl Deduplicator {
    pub fn from_existing(existing: impl IntoIterator<Item = (DedupeKey, String)>) -> Self {
        let mut dedup = Self::default();
        for (key, hash) in existing {
            dedup.hashes.entry(hash).or_insert_with(|| key.clone());
            dedup.keys.insert(key);
        }
        dedup
    }

    /// Records the posting as seen and reports whether it was already known.
    pub fn admit(&mut self, posting: &NormalizedPosting) -> Admission {
        let key = posting.dedupe_key();
        if self.keys.contains(&key) {
            return Admission::Duplicate;
        }
        let hash = posting.content_hash();
        if let Some(other) = self.hashes.get(&hash) {
            debug!(
                company = %posting.company,
                stable_id = %posting.stable_id,
                other_stable_id = %other.stable_id,
                "content hash matches a different stable id; keeping both"
            );
        } else {
            self.hashes.insert(hash, key.clone());
        }
        self.keys.insert(key);
        Admission::New
    }

    pub fn partition(&mut self, batch: Vec<NormalizedPosting>) -> DedupeOutcome {
        let mut outcome = DedupeOutcome::default();
        for posting in batch {
            let collides = self.hashes.contains_key(&posting.content_hash());
            match self.admit(&posting) {
                Admission::New => {
                    if collides {
                        outcome.content_hash_collisions += 1;
                    }
                    outcome.fresh.push(posting);
                }
                Admission::Duplicate => outcome.duplicates += 1,
            }
        }
        outcome
    }
}
