//! Raw tool-output recognizers.
//!
//! The only place that pattern-matches compiler, bundler, test-runner and
//! boot logs. Everything here returns typed hits; callers never see the
//! patterns themselves.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNotFound {
    pub file: Option<String>,
    pub import: String,
}

static TS_CANNOT_FIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?P<file>[^\s():]+?)(?:\(\d+,\d+\)|:\d+:\d+)?\s*[:\-]?\s*error TS2307: Cannot find module '(?P<import>[^']+)'",
    )
    .unwrap()
});
static BUNDLER_CANNOT_RESOLVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Module not found: Error: Can't resolve '(?P<import>[^']+)' in '(?P<file>[^']+)'")
        .unwrap()
});
static ESM_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Cannot find (?:module|package) '(?P<import>[^']+)' imported from (?P<file>\S+)")
        .unwrap()
});
static NODE_CANNOT_FIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Error: Cannot find module '(?P<import>[^']+)'(?:\s*\nRequire stack:\s*\n-\s*(?P<file>\S+))?",
    )
    .unwrap()
});

static NOT_A_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"TypeError: .+ is not a function|TypeError: .*requires (?:a )?middleware function",
    )
    .unwrap()
});

static MIGRATION_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmigration(?:s)?\b.*\b(?:failed|error)\b|\bP30\d\d\b|relation .+ does not exist")
        .unwrap()
});

static HEALTH_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhealth(?:check|z)?\b.*\b(?:failed|timed? ?out|status (?:[45]\d\d))\b").unwrap()
});

/// Every module-not-found diagnostic in `text`, in position order.
pub fn module_not_found(text: &str) -> Vec<ModuleNotFound> {
    let mut hits: Vec<(usize, ModuleNotFound)> = Vec::new();
    let mut seen_positions = std::collections::BTreeSet::new();
    for pattern in [
        &*TS_CANNOT_FIND,
        &*BUNDLER_CANNOT_RESOLVE,
        &*ESM_NOT_FOUND,
        &*NODE_CANNOT_FIND,
    ] {
        for cap in pattern.captures_iter(text) {
            let Some(import) = cap.name("import") else {
                continue;
            };
            // ESM and plain node messages overlap on the same span.
            if !seen_positions.insert(import.start()) {
                continue;
            }
            hits.push((
                import.start(),
                ModuleNotFound {
                    file: cap.name("file").map(|f| f.as_str().to_string()),
                    import: import.as_str().to_string(),
                },
            ));
        }
    }
    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, hit)| hit).collect()
}

/// First line carrying a "not a function"-class runtime error, trimmed.
pub fn middleware_api_error(text: &str) -> Option<String> {
    text.lines()
        .find(|line| NOT_A_FUNCTION.is_match(line))
        .map(|line| line.trim().to_string())
}

pub fn migration_failure(text: &str) -> bool {
    MIGRATION_FAILURE.is_match(text)
}

pub fn health_check_failure(text: &str) -> bool {
    HEALTH_FAILURE.is_match(text)
}
