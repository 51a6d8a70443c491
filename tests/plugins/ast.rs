use archgate::core::contract::ArchitectureContract;
use archgate::core::validate::Validator;
use archgate::core::violation::{Severity, rules};
use archgate::plugins::ast::AstPatternValidator;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

#[test]
fn persistence_only_in_repository_layers() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/modules/users/controller/users.controller.ts",
        "import { PrismaClient } from '@prisma/client';\n",
    );
    write(
        tmp.path(),
        "src/middleware/auth.ts",
        "const { Pool } = require('pg');\n",
    );
    write(
        tmp.path(),
        "src/modules/users/repository/users.repository.ts",
        "import { PrismaClient } from '@prisma/client';\n",
    );

    let out = AstPatternValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    let files: Vec<_> = out
        .iter()
        .filter(|v| v.rule_id == rules::AST_PERSISTENCE_IN_LAYER)
        .map(|v| (v.file.as_str(), v.target_or_empty()))
        .collect();
    assert_eq!(
        files,
        vec![
            ("src/middleware/auth.ts", "pg"),
            (
                "src/modules/users/controller/users.controller.ts",
                "@prisma/client"
            ),
        ]
    );
}

#[test]
fn http_coupling_and_console_are_warnings() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/modules/users/service/users.service.ts",
        "import { Request } from 'express';\nexport function f() { console.log('x'); }\n",
    );
    write(
        tmp.path(),
        "src/modules/users/service/users.service.test.ts",
        "console.log('ignored in tests');\n",
    );

    let out = AstPatternValidator
        .scan(tmp.path(), &ArchitectureContract::default())
        .expect("scan");
    let ids: Vec<_> = out.iter().map(|v| v.rule_id.as_str()).collect();
    assert_eq!(ids, vec![rules::AST_HTTP_IN_SERVICE, rules::AST_CONSOLE_LOG]);
    assert!(out.iter().all(|v| v.severity == Severity::Warning));
    assert_eq!(out[0].target.as_deref(), Some("express"));
}
