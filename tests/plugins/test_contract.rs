use archgate::core::contract::ArchitectureContract;
use archgate::core::validate::Validator;
use archgate::core::violation::{Severity, rules};
use archgate::plugins::test_contract::TestContractValidator;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

#[test]
fn modules_need_test_files_with_cases() {
    let tmp = tempdir().expect("tempdir");
    write(tmp.path(), "src/modules/users/service/users.service.ts", "export {};\n");
    write(
        tmp.path(),
        "src/modules/users/service/users.service.test.ts",
        "it('creates', () => {});\n",
    );
    write(tmp.path(), "src/modules/orders/service/orders.service.ts", "export {};\n");
    write(tmp.path(), "src/modules/billing/service/billing.service.ts", "export {};\n");
    write(
        tmp.path(),
        "tests/billing/billing.spec.ts",
        "describe('billing', () => {});\n",
    );

    let out = TestContractValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    assert_eq!(out.len(), 2);

    assert_eq!(out[0].rule_id, rules::TEST_CONTRACT_EMPTY);
    assert_eq!(out[0].severity, Severity::Warning);
    assert_eq!(out[0].file, "tests/billing/billing.spec.ts");
    assert_eq!(out[0].target.as_deref(), Some("billing"));

    assert_eq!(out[1].rule_id, rules::TEST_CONTRACT_MISSING);
    assert_eq!(out[1].file, "src/modules/orders");
    assert_eq!(out[1].target.as_deref(), Some("orders"));
}
