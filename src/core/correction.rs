//! Correction policy engine.
//!
//! Two halves that never share state:
//! - Constraint derivation: a fixed per-intent edit budget, clamped to the
//!   caller's global caps.
//! - Compliance verification: checks that a finished correction step declared
//!   consistent metadata and kept its staged diffs inside the declared budget.

use crate::core::failure::{
    CHECK_ARCHITECTURE, CHECK_BOOT, CHECK_TESTS, CheckResult, FailureClassificationProfile,
    FailureReason,
};
use crate::core::output;
use crate::core::signals;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const DEFAULT_MAX_FILES_PER_STEP: usize = 12;
pub const DEFAULT_MAX_TOTAL_DIFF_BYTES: usize = 120_000;

const ENV_MAX_FILES: &str = "ARCHGATE_MAX_FILES_PER_STEP";
const ENV_MAX_DIFF_BYTES: &str = "ARCHGATE_MAX_TOTAL_DIFF_BYTES";

/// Offending paths listed in an aggregated staged-path violation.
const MAX_LISTED_PATHS: usize = 5;

/// Closed rule-id vocabulary for correction steps.
pub mod rules {
    pub const METADATA_PRESENT: &str = "correction_metadata_present";
    pub const PHASE_PRESENT: &str = "correction_phase_present";
    pub const ATTEMPT_POSITIVE: &str = "correction_attempt_positive";
    pub const ATTEMPT_SUFFIX_MATCH: &str = "correction_attempt_suffix_match";
    pub const FAILED_STEP_PRESENT: &str = "correction_failed_step_present";
    pub const CONSTRAINT_PRESENT: &str = "correction_constraint_present";
    pub const CONSTRAINT_MAX_FILES_POSITIVE: &str = "correction_constraint_max_files_positive";
    pub const CONSTRAINT_MAX_BYTES_POSITIVE: &str = "correction_constraint_max_bytes_positive";
    pub const CONSTRAINT_PREFIXES_PRESENT: &str = "correction_constraint_prefixes_present";
    pub const CONSTRAINT_MAX_FILES_WITHIN_CAP: &str = "correction_constraint_max_files_within_cap";
    pub const CONSTRAINT_MAX_BYTES_WITHIN_CAP: &str = "correction_constraint_max_bytes_within_cap";
    pub const INTENT_MATCHES_CONSTRAINT: &str = "correction_intent_matches_constraint";
    pub const RESOLVED_CONSTRAINT_CONSISTENCY: &str = "correction_resolved_constraint_consistency";
    pub const COMMIT_PRESENT: &str = "correction_commit_present";
    pub const STAGED_DIFFS_PRESENT: &str = "correction_staged_diffs_present";
    pub const STAGED_PATHS_WITHIN_CONSTRAINT: &str = "correction_staged_paths_within_constraint";
    pub const STAGED_FILE_COUNT_WITHIN_CONSTRAINT: &str =
        "correction_staged_file_count_within_constraint";
    pub const DIFF_BUDGET_WITHIN_CONSTRAINT: &str = "correction_diff_budget_within_constraint";
    pub const FAILED_ERROR_MESSAGE: &str = "correction_failed_error_message";
}

static CORRECTION_STEP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<kind>.+)-correction-(?P<attempt>\d+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionIntent {
    RuntimeBoot,
    RuntimeHealth,
    TypescriptCompile,
    TestFailure,
    MigrationFailure,
    ArchitectureViolation,
    SecurityBaseline,
    #[serde(other)]
    Unknown,
}

impl CorrectionIntent {
    pub const ALL: [CorrectionIntent; 8] = [
        Self::RuntimeBoot,
        Self::RuntimeHealth,
        Self::TypescriptCompile,
        Self::TestFailure,
        Self::MigrationFailure,
        Self::ArchitectureViolation,
        Self::SecurityBaseline,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RuntimeBoot => "runtime_boot",
            Self::RuntimeHealth => "runtime_health",
            Self::TypescriptCompile => "typescript_compile",
            Self::TestFailure => "test_failure",
            Self::MigrationFailure => "migration_failure",
            Self::ArchitectureViolation => "architecture_violation",
            Self::SecurityBaseline => "security_baseline",
            Self::Unknown => "unknown",
        }
    }

    /// Unrecognized names map to `Unknown`.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == name)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for CorrectionIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionCaps {
    pub max_files_per_step: usize,
    pub max_total_diff_bytes: usize,
}

impl Default for CorrectionCaps {
    fn default() -> Self {
        Self {
            max_files_per_step: DEFAULT_MAX_FILES_PER_STEP,
            max_total_diff_bytes: DEFAULT_MAX_TOTAL_DIFF_BYTES,
        }
    }
}

impl CorrectionCaps {
    /// Defaults, overridden by positive integer environment values.
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
        };
        let defaults = Self::default();
        Self {
            max_files_per_step: read(ENV_MAX_FILES).unwrap_or(defaults.max_files_per_step),
            max_total_diff_bytes: read(ENV_MAX_DIFF_BYTES).unwrap_or(defaults.max_total_diff_bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerCorrectionConstraint {
    pub intent: CorrectionIntent,
    pub max_files: usize,
    pub max_total_diff_bytes: usize,
    pub allowed_path_prefixes: Vec<String>,
    #[serde(default)]
    pub guidance: Vec<String>,
}

struct IntentBudget {
    max_files: usize,
    max_total_diff_bytes: usize,
    prefixes: &'static [&'static str],
    guidance: &'static [&'static str],
}

fn budget_for(intent: CorrectionIntent) -> IntentBudget {
    match intent {
        CorrectionIntent::RuntimeBoot => IntentBudget {
            max_files: 4,
            max_total_diff_bytes: 24_000,
            prefixes: &["src/", "package.json"],
            guidance: &[
                "Fix the failing boot path only; do not restructure modules.",
                "Prefer correcting imports and entrypoint wiring over adding dependencies.",
            ],
        },
        CorrectionIntent::RuntimeHealth => IntentBudget {
            max_files: 3,
            max_total_diff_bytes: 16_000,
            prefixes: &["src/routes/", "src/app.ts", "src/server.ts"],
            guidance: &[
                "Restore the health endpoint and its route registration.",
                "Keep the response contract unchanged.",
            ],
        },
        CorrectionIntent::TypescriptCompile => IntentBudget {
            max_files: 6,
            max_total_diff_bytes: 40_000,
            prefixes: &["src/", "tsconfig.json"],
            guidance: &[
                "Resolve the reported compiler diagnostics without loosening compiler options.",
                "Do not add path aliases; use relative imports.",
            ],
        },
        CorrectionIntent::TestFailure => IntentBudget {
            max_files: 6,
            max_total_diff_bytes: 40_000,
            prefixes: &["src/", "tests/", "test/"],
            guidance: &[
                "Fix the implementation before touching assertions.",
                "Do not delete or skip failing tests.",
            ],
        },
        CorrectionIntent::MigrationFailure => IntentBudget {
            max_files: 3,
            max_total_diff_bytes: 20_000,
            prefixes: &["prisma/", "migrations/", "src/db/"],
            guidance: &[
                "Repair the failing migration or schema definition only.",
                "Never edit an already-applied migration in place; add a new one.",
            ],
        },
        CorrectionIntent::ArchitectureViolation => IntentBudget {
            max_files: 12,
            max_total_diff_bytes: 120_000,
            prefixes: &["src/"],
            guidance: &[
                "Move code into the canonical module layers instead of adding new layer names.",
                "Route cross-layer calls through the layer matrix; import other modules only via service or model.",
            ],
        },
        CorrectionIntent::SecurityBaseline => IntentBudget {
            max_files: 4,
            max_total_diff_bytes: 24_000,
            prefixes: &["src/", ".gitignore", ".env.example"],
            guidance: &[
                "Move secrets to environment variables and document them in .env.example.",
                "Never commit a real .env file.",
            ],
        },
        CorrectionIntent::Unknown => IntentBudget {
            max_files: 2,
            max_total_diff_bytes: 12_000,
            prefixes: &["src/"],
            guidance: &["Make the smallest change that addresses the reported failure."],
        },
    }
}

/// `\` to `/`, then leading `/` and `./` stripped. Trailing slashes are kept:
/// they decide how the prefix matches.
pub fn normalize_prefix(prefix: &str) -> String {
    let mut p = prefix.trim().replace('\\', "/");
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest.to_string();
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest.to_string();
        } else {
            break;
        }
    }
    p
}

/// Normalized, empty entries dropped, deduplicated in first-seen order.
pub fn normalize_prefixes<S: AsRef<str>>(prefixes: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in prefixes {
        let n = normalize_prefix(p.as_ref());
        if !n.is_empty() && !out.contains(&n) {
            out.push(n);
        }
    }
    out
}

/// Segment-aware containment: `src/` holds `src/a.ts`; `src` holds `src` and
/// `src/a.ts` but not `srcx.ts`.
pub fn path_within_prefix(path: &str, prefix: &str) -> bool {
    let path = normalize_prefix(path);
    let prefix = normalize_prefix(prefix);
    if prefix.is_empty() {
        return false;
    }
    if prefix.ends_with('/') {
        path.starts_with(&prefix)
    } else {
        path == prefix
            || path
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

pub fn derive_constraint(
    intent: CorrectionIntent,
    caps: &CorrectionCaps,
) -> PlannerCorrectionConstraint {
    let budget = budget_for(intent);
    PlannerCorrectionConstraint {
        intent,
        max_files: budget.max_files.min(caps.max_files_per_step),
        max_total_diff_bytes: budget.max_total_diff_bytes.min(caps.max_total_diff_bytes),
        allowed_path_prefixes: normalize_prefixes(budget.prefixes),
        guidance: budget.guidance.iter().map(|g| g.to_string()).collect(),
    }
}

/// Intent implied by the classifier's reason alone.
pub fn intent_for_profile(profile: &FailureClassificationProfile) -> CorrectionIntent {
    match profile.reason {
        Some(FailureReason::Architecture) => CorrectionIntent::ArchitectureViolation,
        Some(FailureReason::Typecheck) | Some(FailureReason::Build) => {
            CorrectionIntent::TypescriptCompile
        }
        None => CorrectionIntent::Unknown,
    }
}

/// Intent from the profile plus the raw checks it was built from.
///
/// An architecture failure made only of `SEC.*` records is a security fix.
/// Without a classifier reason, failed boot and test checks pick the runtime
/// intents.
pub fn infer_correction_intent(
    profile: &FailureClassificationProfile,
    checks: &[CheckResult],
) -> CorrectionIntent {
    let failed = |id: &str| checks.iter().find(|c| c.id == id && c.failed());

    if profile.reason == Some(FailureReason::Architecture)
        && let Some(arch) = failed(CHECK_ARCHITECTURE)
    {
        let blocking: Vec<_> = arch
            .violations()
            .iter()
            .filter(|v| v.severity.is_blocking())
            .collect();
        if !blocking.is_empty() && blocking.iter().all(|v| v.rule_id.starts_with("SEC.")) {
            return CorrectionIntent::SecurityBaseline;
        }
    }
    if profile.reason.is_some() {
        return intent_for_profile(profile);
    }
    if let Some(boot) = failed(CHECK_BOOT) {
        let raw = boot.raw_output();
        if signals::migration_failure(&raw) {
            return CorrectionIntent::MigrationFailure;
        }
        if signals::health_check_failure(&raw) {
            return CorrectionIntent::RuntimeHealth;
        }
        return CorrectionIntent::RuntimeBoot;
    }
    if failed(CHECK_TESTS).is_some() {
        return CorrectionIntent::TestFailure;
    }
    CorrectionIntent::Unknown
}

// ===== Compliance verification =====

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionClassification {
    #[serde(default)]
    pub intent: Option<String>,
}

/// A constraint as a step declared it. Kept loosely typed so that bad values
/// surface as policy violations rather than parse errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredConstraint {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub max_files: Option<i64>,
    #[serde(default)]
    pub max_total_diff_bytes: Option<i64>,
    #[serde(default)]
    pub allowed_path_prefixes: Vec<String>,
    #[serde(default)]
    pub guidance: Vec<String>,
}

impl From<&PlannerCorrectionConstraint> for DeclaredConstraint {
    fn from(c: &PlannerCorrectionConstraint) -> Self {
        Self {
            intent: Some(c.intent.as_str().to_string()),
            max_files: Some(c.max_files as i64),
            max_total_diff_bytes: Some(c.max_total_diff_bytes as i64),
            allowed_path_prefixes: c.allowed_path_prefixes.clone(),
            guidance: c.guidance.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepCorrectionMetadata {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub attempt: Option<i64>,
    #[serde(default)]
    pub failed_step_id: Option<String>,
    #[serde(default)]
    pub classification: Option<CorrectionClassification>,
    #[serde(default)]
    pub constraint: Option<DeclaredConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionStepInput {
    /// Raw metadata object; parsed during evaluation.
    #[serde(rename = "_deepCorrection", default, skip_serializing_if = "Option::is_none")]
    pub deep_correction: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedDiff {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub diff_preview: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutputPayload {
    #[serde(default)]
    pub staged_diffs: Vec<StagedDiff>,
}

/// Everything known about one finished correction step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionStepEvaluation {
    pub id: String,
    #[serde(default)]
    pub input: CorrectionStepInput,
    #[serde(default)]
    pub status: Option<StepStatus>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub output_payload: Option<StepOutputPayload>,
    #[serde(default)]
    pub resolved_constraint: Option<PlannerCorrectionConstraint>,
    #[serde(default)]
    pub max_files_per_step: Option<usize>,
    #[serde(default)]
    pub max_total_diff_bytes: Option<usize>,
}

impl CorrectionStepEvaluation {
    fn caps(&self) -> CorrectionCaps {
        let defaults = CorrectionCaps::default();
        CorrectionCaps {
            max_files_per_step: self.max_files_per_step.unwrap_or(defaults.max_files_per_step),
            max_total_diff_bytes: self
                .max_total_diff_bytes
                .unwrap_or(defaults.max_total_diff_bytes),
        }
    }

    fn staged_diffs(&self) -> &[StagedDiff] {
        self.output_payload
            .as_ref()
            .map(|p| p.staged_diffs.as_slice())
            .unwrap_or(&[])
    }

    fn metadata(&self) -> Option<DeepCorrectionMetadata> {
        let raw = self.input.deep_correction.as_ref()?;
        if !raw.is_object() {
            return None;
        }
        serde_json::from_value(raw.clone()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicySeverity {
    Fatal,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionPolicyViolation {
    pub rule_id: String,
    pub severity: PolicySeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionPolicyResult {
    pub ok: bool,
    pub blocking_count: usize,
    pub warning_count: usize,
    pub summary: String,
    pub violations: Vec<CorrectionPolicyViolation>,
}

impl CorrectionPolicyResult {
    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.violations.iter().any(|v| v.rule_id == rule_id)
    }

    fn from_violations(violations: Vec<CorrectionPolicyViolation>) -> Self {
        let mut failed_ids: Vec<&str> = Vec::new();
        for v in violations
            .iter()
            .filter(|v| v.severity == PolicySeverity::Fatal)
        {
            if !failed_ids.contains(&v.rule_id.as_str()) {
                failed_ids.push(&v.rule_id);
            }
        }
        let blocking_count = violations
            .iter()
            .filter(|v| v.severity == PolicySeverity::Fatal)
            .count();
        let warning_count = violations.len() - blocking_count;
        let summary = if blocking_count > 0 {
            format!("correction policy failed: {}", failed_ids.join(", "))
        } else {
            format!("correction policy passed ({} warning(s))", warning_count)
        };
        Self {
            ok: blocking_count == 0,
            blocking_count,
            warning_count,
            summary,
            violations,
        }
    }
}

#[derive(Default)]
struct Findings(Vec<CorrectionPolicyViolation>);

impl Findings {
    fn fatal(&mut self, rule_id: &str, message: impl Into<String>) {
        self.0.push(CorrectionPolicyViolation {
            rule_id: rule_id.to_string(),
            severity: PolicySeverity::Fatal,
            message: message.into(),
        });
    }

    fn warn(&mut self, rule_id: &str, message: impl Into<String>) {
        self.0.push(CorrectionPolicyViolation {
            rule_id: rule_id.to_string(),
            severity: PolicySeverity::Warning,
            message: message.into(),
        });
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn sorted_prefixes(prefixes: &[String]) -> Vec<String> {
    let mut out = normalize_prefixes(prefixes);
    out.sort();
    out
}

fn check_identity(step: &CorrectionStepEvaluation, meta: &DeepCorrectionMetadata, f: &mut Findings) {
    if is_blank(meta.phase.as_deref()) {
        f.fatal(rules::PHASE_PRESENT, "correction metadata has no phase");
    }
    match meta.attempt {
        Some(attempt) if attempt >= 1 => {
            let suffix = CORRECTION_STEP_ID
                .captures(&step.id)
                .and_then(|c| c.name("attempt"))
                .and_then(|m| m.as_str().parse::<i64>().ok());
            if suffix != Some(attempt) {
                f.fatal(
                    rules::ATTEMPT_SUFFIX_MATCH,
                    format!(
                        "step id '{}' does not end in '-correction-{}'",
                        step.id, attempt
                    ),
                );
            }
        }
        other => f.fatal(
            rules::ATTEMPT_POSITIVE,
            format!("correction attempt must be >= 1 (got {:?})", other),
        ),
    }
    if is_blank(meta.failed_step_id.as_deref()) {
        f.fatal(
            rules::FAILED_STEP_PRESENT,
            "correction metadata does not name the failed step",
        );
    }
}

fn check_constraint_shape(c: &DeclaredConstraint, caps: &CorrectionCaps, f: &mut Findings) {
    match c.max_files {
        Some(n) if n > 0 => {
            if n as u64 > caps.max_files_per_step as u64 {
                f.fatal(
                    rules::CONSTRAINT_MAX_FILES_WITHIN_CAP,
                    format!(
                        "constraint maxFiles {} exceeds cap {}",
                        n, caps.max_files_per_step
                    ),
                );
            }
        }
        other => f.fatal(
            rules::CONSTRAINT_MAX_FILES_POSITIVE,
            format!("constraint maxFiles must be positive (got {:?})", other),
        ),
    }
    match c.max_total_diff_bytes {
        Some(n) if n > 0 => {
            if n as u64 > caps.max_total_diff_bytes as u64 {
                f.fatal(
                    rules::CONSTRAINT_MAX_BYTES_WITHIN_CAP,
                    format!(
                        "constraint maxTotalDiffBytes {} exceeds cap {}",
                        n, caps.max_total_diff_bytes
                    ),
                );
            }
        }
        other => f.fatal(
            rules::CONSTRAINT_MAX_BYTES_POSITIVE,
            format!(
                "constraint maxTotalDiffBytes must be positive (got {:?})",
                other
            ),
        ),
    }
    if normalize_prefixes(&c.allowed_path_prefixes).is_empty() {
        f.fatal(
            rules::CONSTRAINT_PREFIXES_PRESENT,
            "constraint has no allowed path prefixes",
        );
    }
}

fn check_resolved(
    declared: &DeclaredConstraint,
    resolved: &PlannerCorrectionConstraint,
    f: &mut Findings,
) {
    let matches = declared.intent.as_deref().map(str::trim) == Some(resolved.intent.as_str())
        && declared.max_files == Some(resolved.max_files as i64)
        && declared.max_total_diff_bytes == Some(resolved.max_total_diff_bytes as i64)
        && sorted_prefixes(&declared.allowed_path_prefixes)
            == sorted_prefixes(&resolved.allowed_path_prefixes);
    if !matches {
        f.fatal(
            rules::RESOLVED_CONSTRAINT_CONSISTENCY,
            format!(
                "declared constraint differs from the resolved '{}' constraint ({} files, {} bytes)",
                resolved.intent, resolved.max_files, resolved.max_total_diff_bytes
            ),
        );
    }
}

fn check_staged(diffs: &[StagedDiff], c: &DeclaredConstraint, f: &mut Findings) {
    let prefixes = normalize_prefixes(&c.allowed_path_prefixes);

    let mut distinct: Vec<String> = Vec::new();
    let mut outside: Vec<String> = Vec::new();
    for diff in diffs {
        let path = normalize_prefix(&diff.path);
        if distinct.contains(&path) {
            continue;
        }
        if !prefixes.iter().any(|p| path_within_prefix(&path, p)) {
            outside.push(path.clone());
        }
        distinct.push(path);
    }
    if !outside.is_empty() {
        f.fatal(
            rules::STAGED_PATHS_WITHIN_CONSTRAINT,
            format!(
                "{} staged path(s) outside allowed prefixes: {}",
                outside.len(),
                output::bounded_list(&outside, MAX_LISTED_PATHS)
            ),
        );
    }

    if let Some(max_files) = c.max_files.filter(|n| *n > 0)
        && distinct.len() as i64 > max_files
    {
        f.fatal(
            rules::STAGED_FILE_COUNT_WITHIN_CONSTRAINT,
            format!(
                "{} staged file(s) exceed maxFiles {}: {}",
                distinct.len(),
                max_files,
                output::bounded_list(&distinct, MAX_LISTED_PATHS)
            ),
        );
    }

    let total: usize = diffs.iter().map(|d| d.diff_preview.len()).sum();
    if let Some(max_bytes) = c.max_total_diff_bytes.filter(|n| *n > 0)
        && total as i64 > max_bytes
    {
        f.fatal(
            rules::DIFF_BUDGET_WITHIN_CONSTRAINT,
            format!(
                "staged diffs total {} bytes, budget is {}",
                total, max_bytes
            ),
        );
    }
}

/// Verify one correction step against its declared metadata and budget.
pub fn evaluate_correction_step(step: &CorrectionStepEvaluation) -> CorrectionPolicyResult {
    let mut f = Findings::default();

    let Some(meta) = step.metadata() else {
        f.fatal(
            rules::METADATA_PRESENT,
            format!("step '{}' carries no correction metadata object", step.id),
        );
        tracing::debug!(step = %step.id, "correction step has no metadata");
        return CorrectionPolicyResult::from_violations(f.0);
    };

    check_identity(step, &meta, &mut f);

    let caps = step.caps();
    match &meta.constraint {
        None => f.fatal(rules::CONSTRAINT_PRESENT, "correction metadata has no constraint"),
        Some(c) => {
            check_constraint_shape(c, &caps, &mut f);

            let declared_intent = meta
                .classification
                .as_ref()
                .and_then(|cl| cl.intent.as_deref())
                .map(str::trim);
            let constraint_intent = c.intent.as_deref().map(str::trim);
            if declared_intent.is_none() || declared_intent != constraint_intent {
                f.fatal(
                    rules::INTENT_MATCHES_CONSTRAINT,
                    format!(
                        "classification intent {:?} does not match constraint intent {:?}",
                        declared_intent, constraint_intent
                    ),
                );
            }

            if let Some(resolved) = &step.resolved_constraint {
                check_resolved(c, resolved, &mut f);
            }
        }
    }

    let diffs = step.staged_diffs();
    match step.status {
        Some(StepStatus::Completed) => {
            if is_blank(step.commit_hash.as_deref()) {
                f.fatal(rules::COMMIT_PRESENT, "completed correction has no commit hash");
            }
            if diffs.is_empty() {
                f.fatal(
                    rules::STAGED_DIFFS_PRESENT,
                    "completed correction staged no diffs",
                );
            }
        }
        Some(StepStatus::Failed) if is_blank(step.error_message.as_deref()) => {
            f.warn(
                rules::FAILED_ERROR_MESSAGE,
                "failed correction did not report an error message",
            );
        }
        _ => {}
    }

    if !diffs.is_empty()
        && let Some(c) = &meta.constraint
    {
        check_staged(diffs, c, &mut f);
    }

    let result = CorrectionPolicyResult::from_violations(f.0);
    tracing::debug!(
        step = %step.id,
        ok = result.ok,
        blocking = result.blocking_count,
        warnings = result.warning_count,
        "evaluated correction step"
    );
    result
}
