//! Individual pass/fail gates. Each is a pure function of its inputs.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use jobsift_core::PostedTimestamp;
use regex::Regex;

static US_MARKER_CI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bunited\s+states\b|\busa\b|\bu\.s\.").expect("valid regex")
});

static US_MARKER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bUS\b").expect("valid regex"));

static CITY_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r",\s*([A-Za-z]{2})(?:\s+\d{5}(?:-\d{4})?)?\s*$").expect("valid regex")
});

const US_STATE_CODES: [&str; 56] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR", "GU", "VI", "AS", "MP",
];

/// Non-US cities that job boards suffix with an ISO country code which is
/// also a US state code, e.g. `Bangalore, IN` or `Munich, DE`.
const COUNTRY_CODE_CITIES: [(&str, &[&str]); 7] = [
    (
        "IN",
        &[
            "bangalore", "bengaluru", "hyderabad", "pune", "chennai", "mumbai", "delhi",
            "gurgaon", "gurugram", "noida", "kolkata", "ahmedabad",
        ],
    ),
    (
        "DE",
        &[
            "berlin", "munich", "münchen", "hamburg", "frankfurt", "cologne", "köln",
            "stuttgart", "düsseldorf", "dusseldorf",
        ],
    ),
    (
        "CA",
        &["toronto", "vancouver", "montreal", "montréal", "ottawa", "calgary", "waterloo", "edmonton"],
    ),
    ("IL", &["tel aviv", "haifa", "jerusalem", "herzliya"]),
    ("AR", &["buenos aires", "córdoba"]),
    ("CO", &["bogotá", "bogota", "medellín", "medellin"]),
    ("ID", &["jakarta"]),
];

static RESTRICTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\bno\s+(?:visa\s+)?sponsorship\b",
        r"|\b(?:unable|cannot|can\s*not|will\s+not|won't|not\s+able)\s+(?:to\s+)?sponsor",
        r"|\bwithout\s+(?:visa\s+)?sponsorship\b",
        r"|\b(?:u\.s\.|us)?\s*citizens?\s+only\b",
        r"|\bmust\s+be\s+a\s+(?:u\.s\.|us|united\s+states)\s+citizen\b",
        r"|\b(?:u\.s\.|us)\s+citizenship\s+(?:is\s+)?required\b",
        r"|\bgreen\s+card\s+(?:holders?\s+)?only\b",
        r"|\bgc\s+only\b",
        r"|\b(?:active|secret|top\s+secret)?\s*security\s+clearance\b",
        r"|\bactive\s+clearance\b",
        r"|\bsecret\s+clearance\b",
        r"|\bts/sci\b",
    ))
    .expect("valid regex")
});

static SENIOR_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:staff|senior|sr\.?|principal|member\s+of\s+technical\s+staff)\b")
        .expect("valid regex")
});

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.;\n•]").expect("valid regex"));

static REQUIREMENT_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\bexp(?:erience)?\b",
        r"|\brequir(?:e|es|ed|ement|ements)\b",
        r"|\bminimum\b|\bat\s+least\b|\bmust\s+have\b",
        r"|\b\d{1,2}\s*(?:\+|plus)\s*(?:years?|yrs?)\b",
    ))
    .expect("valid regex")
});

static DEGREE_LENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\W*(?:degree|program)").expect("valid regex"));

static YEARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s*(?:\+|plus)?\s*(?:(?:-|–|—|to)\s*\d{1,2}\s*)?\+?\s*(?:years?|yrs?)\b",
    )
    .expect("valid regex")
});

static UNPARSED_FRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btoday\b|\b1\s+day\b|\b24\s+hours?\b").expect("valid regex")
});

/// True when the location names the US explicitly or ends in a US
/// `City, ST` pair. Multi-location strings pass when any part does.
pub fn is_us_location(location: &str) -> bool {
    let location = location.trim();
    if location.is_empty() {
        return false;
    }
    if US_MARKER_CI.is_match(location) || US_MARKER_UPPER.is_match(location) {
        return true;
    }
    location.split([';', '|', '/']).any(|part| {
        let part = part.trim();
        let Some(caps) = CITY_STATE.captures(part) else {
            return false;
        };
        let code = caps[1].to_ascii_uppercase();
        US_STATE_CODES.contains(&code.as_str()) && !is_foreign_city(part, &code)
    })
}

fn is_foreign_city(part: &str, code: &str) -> bool {
    let lower = part.to_lowercase();
    COUNTRY_CODE_CITIES
        .iter()
        .filter(|(country, _)| *country == code)
        .flat_map(|(_, cities)| cities.iter())
        .any(|city| lower.starts_with(city))
}

/// Parsed timestamps must be no older than `window`; future timestamps pass.
/// Unparsed text only passes when it says today / 1 day / 24 hours.
pub fn is_fresh(posted: &PostedTimestamp, now: DateTime<Utc>, window: Duration) -> bool {
    match posted {
        PostedTimestamp::Parsed(at) => now.signed_duration_since(*at) <= window,
        PostedTimestamp::Unparsed(raw) => UNPARSED_FRESH.is_match(raw),
    }
}

/// Missing description text passes; otherwise title and description are
/// both checked.
pub fn is_restricted(title: &str, description: &str) -> bool {
    if description.trim().is_empty() {
        return false;
    }
    RESTRICTED.is_match(title) || RESTRICTED.is_match(description)
}

pub fn is_senior_title(title: &str) -> bool {
    SENIOR_TITLE.is_match(title)
}

/// Smallest year count stated in a sentence that reads like a requirement:
/// it mentions experience, says required/minimum/at least/must have, or uses
/// the `N+ years` form. Ranges count by their lower bound and degree lengths
/// ("4 year degree") are ignored.
pub fn min_required_years(description: &str) -> Option<u32> {
    SENTENCE_BREAK
        .split(description)
        .filter(|sentence| REQUIREMENT_CUE.is_match(sentence))
        .flat_map(|sentence| {
            YEARS.captures_iter(sentence).filter_map(move |caps| {
                let end = caps.get(0)?.end();
                if DEGREE_LENGTH.is_match(&sentence[end..]) {
                    return None;
                }
                caps[1].parse::<u32>().ok()
            })
        })
        .min()
}
