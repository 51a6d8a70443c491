use archgate::core::contract::ArchitectureContract;
use archgate::core::validate::Validator;
use archgate::core::violation::{Severity, rules};
use archgate::plugins::security::SecurityBaselineValidator;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

#[test]
fn secrets_eval_and_env_file() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/config/db.ts",
        "export const url = 'postgres://admin:hunter22@db:5432/app';\n",
    );
    write(tmp.path(), "src/lib/run.ts", "export const run = (c: string) => eval(c);\n");
    write(tmp.path(), ".env", "DATABASE_URL=postgres://localhost/app\n");
    write(tmp.path(), ".gitignore", "node_modules\n");

    let out = SecurityBaselineValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    let ids: Vec<_> = out
        .iter()
        .map(|v| (v.rule_id.as_str(), v.file.as_str(), v.severity))
        .collect();
    assert_eq!(
        ids,
        vec![
            (rules::SEC_HARDCODED_SECRET, "src/config/db.ts", Severity::Error),
            (rules::SEC_DYNAMIC_EVAL, "src/lib/run.ts", Severity::Error),
            (rules::SEC_ENV_NOT_IGNORED, ".env", Severity::Warning),
        ]
    );
}

#[test]
fn ignored_env_and_clean_sources_pass() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/config/db.ts",
        "export const url = process.env.DATABASE_URL;\n",
    );
    write(tmp.path(), ".env", "DATABASE_URL=x\n");
    write(tmp.path(), ".gitignore", "node_modules\n.env\n");

    let out = SecurityBaselineValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    assert!(out.is_empty(), "{out:?}");
}

#[test]
fn non_utf8_sources_are_skipped() {
    let tmp = tempdir().expect("tempdir");
    write(tmp.path(), "src/lib/run.ts", "export const run = (c: string) => eval(c);\n");
    fs::create_dir_all(tmp.path().join("src/lib")).expect("mkdir");
    fs::write(tmp.path().join("src/lib/blob.ts"), [0xff, 0xfe, 0x00, 0x80]).expect("write");

    let out = SecurityBaselineValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    let ids: Vec<_> = out.iter().map(|v| (v.rule_id.as_str(), v.file.as_str())).collect();
    assert_eq!(ids, vec![(rules::SEC_DYNAMIC_EVAL, "src/lib/run.ts")]);
}
