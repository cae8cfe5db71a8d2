//! URL canonicalization, stable identities and timestamp normalization.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::PostedTimestamp;

pub const SYNTHETIC_ID_NOTE: &str = "synthetic id (content hash)";

const SYNTHETIC_ID_LEN: usize = 16;

static PLACEHOLDER_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://placeholder.invalid/").expect("valid url"));

/// Strips query string and fragment from an absolute or relative URL. Input
/// that is neither comes back unchanged.
pub fn canonicalize_url(input: &str) -> String {
    let trimmed = input.trim();
    let well_formed = match Url::parse(trimmed) {
        Ok(_) => true,
        Err(url::ParseError::RelativeUrlWithoutBase) => PLACEHOLDER_BASE.join(trimmed).is_ok(),
        Err(_) => false,
    };
    if !well_formed {
        return input.to_string();
    }
    match trimmed.find(['?', '#']) {
        Some(cut) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}

/// Resolves a possibly-relative link against the company's career URL.
pub fn resolve_link(base: &str, link: &str) -> String {
    let link = link.trim();
    if link.is_empty() || Url::parse(link).is_ok() {
        return link.to_string();
    }
    Url::parse(base.trim())
        .and_then(|base| base.join(link))
        .map(|joined| joined.to_string())
        .unwrap_or_else(|_| link.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableId {
    pub value: String,
    pub synthetic: bool,
}

/// Source id when present, otherwise a truncated SHA-256 over
/// title|company|location in that order.
pub fn stable_id(id: &str, title: &str, company: &str, location: &str) -> StableId {
    let id = id.trim();
    if !id.is_empty() {
        return StableId {
            value: id.to_string(),
            synthetic: false,
        };
    }
    let basis = format!("{}|{}|{}", title.trim(), company.trim(), location.trim());
    let mut digest = sha256_hex(basis.as_bytes());
    digest.truncate(SYNTHETIC_ID_LEN);
    StableId {
        value: digest,
        synthetic: true,
    }
}

/// Auxiliary dedupe signal over normalized title, company and location.
pub fn content_hash(title: &str, company: &str, location: &str) -> String {
    let basis = [title, company, location]
        .iter()
        .map(|part| collapse_whitespace(&part.to_lowercase()))
        .collect::<Vec<_>>()
        .join("|");
    sha256_hex(basis.as_bytes())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes ISO-8601, epoch digits and relative phrases to UTC. Relative
/// phrases are anchored at `now`.
pub fn normalize_timestamp(raw: &str, now: DateTime<Utc>) -> PostedTimestamp {
    let text = raw.trim();
    if text.is_empty() {
        return PostedTimestamp::Unparsed(String::new());
    }
    parse_absolute(text)
        .or_else(|| parse_relative(text, now))
        .map(PostedTimestamp::Parsed)
        .unwrap_or_else(|| PostedTimestamp::Unparsed(text.to_string()))
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let n: i64 = text.parse().ok()?;
        // 12+ digits can only be milliseconds for any plausible posting date.
        return if text.len() >= 12 {
            Utc.timestamp_millis_opt(n).single()
        } else {
            Utc.timestamp_opt(n, 0).single()
        };
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

static RELATIVE_AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+|an?|one)\+?\s*(minute|min|hour|hr|day|week)s?\s+ago\b")
        .expect("relative time pattern")
});

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.to_lowercase();
    if lower.contains("just now") || lower.contains("just posted") || lower.contains("today") {
        return Some(now);
    }
    if lower.contains("yesterday") {
        return Some(now - Duration::days(1));
    }
    let caps = RELATIVE_AGO.captures(&lower)?;
    let amount = match &caps[1] {
        "a" | "an" | "one" => 1,
        digits => digits.parse::<i64>().ok()?,
    };
    let delta = match &caps[2] {
        "minute" | "min" => Duration::try_minutes(amount)?,
        "hour" | "hr" => Duration::try_hours(amount)?,
        "day" => Duration::try_days(amount)?,
        _ => Duration::try_weeks(amount)?,
    };
    now.checked_sub_signed(delta)
}
