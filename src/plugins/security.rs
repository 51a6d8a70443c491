//! Security baseline heuristics.
//!
//! - Hardcoded secret scanning over source files
//! - Dynamic code evaluation
//! - Environment files that are not git-ignored

use crate::core::contract::ArchitectureContract;
use crate::core::error::ArchgateError;
use crate::core::graph;
use crate::core::validate::Validator;
use crate::core::violation::{Violation, rules};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Secret detection patterns.
static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // AWS Access Key ID
        (
            Regex::new(r"(A3T[A-Z0-9]|AKIA|AGPA|AIDA|AROA|AIPA|ANPA|ANVA|ASIA)[0-9A-Z]{16}")
                .unwrap(),
            "aws_access_key",
        ),
        // GitHub tokens
        (
            Regex::new(r"(ghp|gho|ghu|ghs|ghr)_[a-zA-Z0-9_]{36,255}").unwrap(),
            "github_token",
        ),
        // Private keys
        (
            Regex::new(r"-----BEGIN (RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----").unwrap(),
            "private_key",
        ),
        // Connection strings with inline credentials
        (
            Regex::new(r#"(?i)(postgres(?:ql)?|mysql|mongodb(?:\+srv)?|redis)://[^\s'"/:]+:[^\s'"@]+@[^\s'"]+"#)
                .unwrap(),
            "connection_string",
        ),
        // Generic API key assignments
        (
            Regex::new(
                r#"(?i)(api[_-]?key|apikey|api_secret|secret[_-]?key)['"]?\s*[:=]\s*['"][a-zA-Z0-9_\-]{20,}['"]"#,
            )
            .unwrap(),
            "api_key",
        ),
        // Generic password assignments
        (
            Regex::new(r#"(?i)(password|passwd|pwd)['"]?\s*[:=]\s*['"][^\s'"]{8,}['"]"#).unwrap(),
            "password",
        ),
    ]
});

static DYNAMIC_EVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^.\w])eval\s*\(|\bnew\s+Function\s*\(").unwrap());

pub struct SecurityBaselineValidator;

/// First secret kind found in `line`, if any.
pub fn detect_secret(line: &str) -> Option<&'static str> {
    SECRET_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(line))
        .map(|(_, kind)| *kind)
}

pub fn detect_dynamic_eval(line: &str) -> bool {
    DYNAMIC_EVAL.is_match(line)
}

pub fn gitignore_covers_env(gitignore: &str) -> bool {
    gitignore
        .lines()
        .map(|l| l.trim().trim_start_matches('/'))
        .any(|l| matches!(l, ".env" | ".env*" | "*.env" | "**/.env"))
}

fn scan_source(rel: &str, source: &str, out: &mut Vec<Violation>) {
    let mut secret_lines = Vec::new();
    let mut eval_lines = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        if let Some(kind) = detect_secret(line) {
            secret_lines.push((idx + 1, kind));
        }
        if detect_dynamic_eval(line) {
            eval_lines.push(idx + 1);
        }
    }

    if let Some(&(line, kind)) = secret_lines.first() {
        out.push(
            Violation::error(
                rules::SEC_HARDCODED_SECRET,
                rel.to_string(),
                format!(
                    "Potential hardcoded secret ({}) at line {} ({} finding(s)); load it from the environment",
                    kind,
                    line,
                    secret_lines.len()
                ),
            )
            .with_target(kind),
        );
    }
    if let Some(&line) = eval_lines.first() {
        out.push(Violation::error(
            rules::SEC_DYNAMIC_EVAL,
            rel.to_string(),
            format!(
                "Dynamic code evaluation at line {} ({} finding(s))",
                line,
                eval_lines.len()
            ),
        ));
    }
}

impl Validator for SecurityBaselineValidator {
    fn id(&self) -> &'static str {
        "security"
    }

    fn scan(
        &self,
        project_root: &Path,
        contract: &ArchitectureContract,
    ) -> Result<Vec<Violation>, ArchgateError> {
        let mut violations = Vec::new();

        let src = project_root.join(&contract.source_root);
        let mut files: Vec<_> = graph::collect_tree_files(&src)?
            .into_iter()
            .filter(|p| graph::is_code_file(p))
            .collect();
        files.sort();
        for path in files {
            let Some(content) = graph::read_source(&path)? else {
                continue;
            };
            scan_source(
                &graph::relative_path(project_root, &path),
                &content,
                &mut violations,
            );
        }

        if project_root.join(".env").is_file() {
            let gitignore =
                graph::read_source(&project_root.join(".gitignore"))?.unwrap_or_default();
            if !gitignore_covers_env(&gitignore) {
                violations.push(Violation::warning(
                    rules::SEC_ENV_NOT_IGNORED,
                    ".env",
                    ".env exists but is not listed in .gitignore",
                ));
            }
        }
        Ok(violations)
    }
}
