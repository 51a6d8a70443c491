//! Violation records shared by every validator.
//!
//! Violations are append-only values. Every producer hands back a plain
//! `Vec<Violation>` and the union applies [`sort_violations`] once, so the
//! final list has a total order that downstream consumers can diff.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Closed rule-id vocabulary. Adding an id here is a contract change.
pub mod rules {
    pub const ARCH_LAYER_MATRIX: &str = "ARCH.LAYER_MATRIX";
    pub const ARCH_MODULE_ISOLATION: &str = "ARCH.MODULE_ISOLATION";
    pub const ARCH_UNKNOWN_LAYER: &str = "ARCH.UNKNOWN_LAYER";
    pub const ARCH_UNKNOWN_TOP_LEVEL: &str = "ARCH.UNKNOWN_TOP_LEVEL";

    pub const IMPORT_NON_RELATIVE: &str = "IMPORT.NON_RELATIVE";
    pub const IMPORT_PATH_ALIAS_CONFIG: &str = "IMPORT.PATH_ALIAS_CONFIG";
    pub const IMPORT_MISSING_TARGET: &str = "IMPORT.MISSING_TARGET";

    pub const GRAPH_CYCLE: &str = "GRAPH.CYCLE";

    pub const STRUCTURE_SOURCE_ROOT_MISSING: &str = "STRUCTURE.SOURCE_ROOT_MISSING";
    pub const STRUCTURE_MODULE_MISSING_LAYER: &str = "STRUCTURE.MODULE_MISSING_LAYER";
    pub const STRUCTURE_MODULE_EMPTY: &str = "STRUCTURE.MODULE_EMPTY";

    pub const AST_PERSISTENCE_IN_LAYER: &str = "AST.PERSISTENCE_IN_LAYER";
    pub const AST_HTTP_IN_SERVICE: &str = "AST.HTTP_IN_SERVICE";
    pub const AST_CONSOLE_LOG: &str = "AST.CONSOLE_LOG";

    pub const SEC_HARDCODED_SECRET: &str = "SEC.HARDCODED_SECRET";
    pub const SEC_DYNAMIC_EVAL: &str = "SEC.DYNAMIC_EVAL";
    pub const SEC_ENV_NOT_IGNORED: &str = "SEC.ENV_NOT_IGNORED";

    pub const TEST_CONTRACT_MISSING: &str = "TEST.CONTRACT_MISSING";
    pub const TEST_CONTRACT_EMPTY: &str = "TEST.CONTRACT_EMPTY";

    /// Rule families the failure classifier groups on.
    pub const MISSING_LAYER_FAMILY: &str = "STRUCTURE.MODULE_MISSING_LAYER";
    pub const UNKNOWN_LAYER_FAMILY: &str = "ARCH.UNKNOWN_";
    pub const TEST_CONTRACT_FAMILY: &str = "TEST.CONTRACT";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn error(rule_id: &str, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity: Severity::Error,
            file: file.into(),
            target: None,
            message: message.into(),
        }
    }

    pub fn warning(rule_id: &str, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(rule_id, file, message)
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn target_or_empty(&self) -> &str {
        self.target.as_deref().unwrap_or("")
    }

    /// `(ruleId, file, target ?? "")`, then message and severity so that the
    /// order stays total when two records share a key.
    pub fn ordering(&self, other: &Self) -> Ordering {
        self.rule_id
            .cmp(&other.rule_id)
            .then_with(|| self.file.cmp(&other.file))
            .then_with(|| self.target_or_empty().cmp(other.target_or_empty()))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.severity.cmp(&other.severity))
    }
}

pub fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| a.ordering(b));
}

pub fn blocking_count(violations: &[Violation]) -> usize {
    violations
        .iter()
        .filter(|v| v.severity.is_blocking())
        .count()
}

pub fn warning_count(violations: &[Violation]) -> usize {
    violations.len() - blocking_count(violations)
}
