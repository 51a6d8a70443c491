use archgate::core::contract::ArchitectureContract;
use archgate::core::validate::Validator;
use archgate::core::violation::{Severity, rules};
use archgate::plugins::structure::{self, StructureValidator};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const SIX: [&str; 6] = [
    "routes",
    "controller",
    "service",
    "repository",
    "model",
    "validation",
];

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

#[test]
fn complete_module_has_no_findings() {
    let tmp = tempdir().expect("tempdir");
    for layer in SIX {
        write(
            tmp.path(),
            &format!("src/modules/users/{layer}/users.{layer}.ts"),
            "export {};\n",
        );
    }
    let out = StructureValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    assert!(out.is_empty(), "{out:?}");
}

#[test]
fn missing_layers_are_reported_per_layer() {
    let tmp = tempdir().expect("tempdir");
    for layer in ["routes", "controller", "service", "repository"] {
        write(
            tmp.path(),
            &format!("src/modules/orders/{layer}/orders.{layer}.ts"),
            "export {};\n",
        );
    }
    let out = StructureValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    let targets: Vec<_> = out.iter().map(|v| v.target_or_empty()).collect();
    assert_eq!(targets, vec!["model", "validation"]);
    assert!(out
        .iter()
        .all(|v| v.rule_id == rules::STRUCTURE_MODULE_MISSING_LAYER && v.file == "src/modules/orders"));
}

#[test]
fn empty_module_warns_and_missing_root_errors() {
    let tmp = tempdir().expect("tempdir");
    let contract = ArchitectureContract::default();
    let out = StructureValidator.scan(tmp.path(), &contract).expect("scan");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].rule_id, rules::STRUCTURE_SOURCE_ROOT_MISSING);

    for layer in SIX {
        fs::create_dir_all(tmp.path().join(format!("src/modules/billing/{layer}"))).expect("mkdir");
    }
    let out = StructureValidator.scan(tmp.path(), &contract).expect("scan");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].rule_id, rules::STRUCTURE_MODULE_EMPTY);
    assert_eq!(out[0].severity, Severity::Warning);

    let modules = structure::module_dirs(tmp.path(), &contract).expect("modules");
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].0, "billing");
}
