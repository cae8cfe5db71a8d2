use std::sync::LazyLock;

use jobsift_core::RoleCategory;
use regex::Regex;

static INTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bintern(?:ship)?s?\b").expect("valid regex"));

static NEW_GRAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:new|recent|university|college)\s+grad(?:uate)?s?\b")
        .expect("valid regex")
});

static ENTRY_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bentry[\s-]+level\b|\bjunior\b|\bjr\b").expect("valid regex")
});

static CO_OP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bco[\s-]?op\b").expect("valid regex"));

/// First category whose keywords appear in the title or description, in
/// fixed precedence; Entry-Level otherwise.
/// `Junior` is never inferred, only read back from stored rows.
pub fn infer_role(title: &str, description: &str) -> RoleCategory {
    let text = format!("{title}\n{description}");
    if INTERN.is_match(&text) {
        RoleCategory::Intern
    } else if NEW_GRAD.is_match(&text) {
        RoleCategory::NewGrad
    } else if ENTRY_LEVEL.is_match(&text) {
        RoleCategory::EntryLevel
    } else if CO_OP.is_match(&text) {
        RoleCategory::CoOp
    } else {
        RoleCategory::EntryLevel
    }
}
