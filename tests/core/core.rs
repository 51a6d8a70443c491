use archgate::core::contract::{self, ArchitectureContract};
use archgate::core::correction::{
    self, CorrectionCaps, CorrectionIntent, CorrectionStepEvaluation, StagedDiff,
    StepOutputPayload, StepStatus,
};
use archgate::core::failure::{
    self, CheckDetails, CheckResult, CheckStatus, FailureCluster, FailureReason,
};
use archgate::core::graph;
use archgate::core::validate;
use archgate::core::violation::{Violation, rules};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write fixture");
}

fn rules_of(violations: &[Violation]) -> Vec<&str> {
    violations.iter().map(|v| v.rule_id.as_str()).collect()
}

/// One module with the six canonical layers, wired along the layer matrix.
fn canonical_project(root: &Path) {
    let m = "src/modules/users";
    write(
        root,
        &format!("{m}/routes/users.routes.ts"),
        "import { UsersController } from '../controller/users.controller';\nexport const routes = [UsersController];\n",
    );
    write(
        root,
        &format!("{m}/controller/users.controller.ts"),
        "import { UsersService } from '../service/users.service';\nimport { parseUser } from '../validation/users.validation';\nexport class UsersController {}\n",
    );
    write(
        root,
        &format!("{m}/service/users.service.ts"),
        "import { UsersRepository } from '../repository/users.repository';\nimport type { User } from '../model/users.model';\nexport class UsersService {}\n",
    );
    write(
        root,
        &format!("{m}/repository/users.repository.ts"),
        "import { db } from '../../../db/client';\nimport type { User } from '../model/users.model';\nexport class UsersRepository {}\n",
    );
    write(
        root,
        &format!("{m}/model/users.model.ts"),
        "export interface User { id: string }\n",
    );
    write(
        root,
        &format!("{m}/validation/users.validation.ts"),
        "import type { User } from '../model/users.model';\nexport function parseUser(x: unknown): User { return x as User; }\n",
    );
    write(
        root,
        "src/db/client.ts",
        "import { PrismaClient } from '@prisma/client';\nexport const db = new PrismaClient();\n",
    );
    write(
        root,
        "src/app.ts",
        "import { routes } from './modules/users/routes/users.routes';\nexport const app = { routes };\n",
    );
    write(
        root,
        "tests/users/users.test.ts",
        "import { parseUser } from '../../src/modules/users/validation/users.validation';\nit('parses', () => { parseUser({ id: '1' }); });\n",
    );
}

fn snapshot(root: &Path) -> BTreeMap<String, (Vec<u8>, SystemTime)> {
    graph::collect_tree_files(root)
        .expect("walk")
        .into_iter()
        .map(|p| {
            let meta = fs::metadata(&p).expect("metadata");
            (
                graph::relative_path(root, &p),
                (fs::read(&p).expect("read"), meta.modified().expect("mtime")),
            )
        })
        .collect()
}

#[test]
fn canonical_project_validates_clean() {
    let tmp = tempdir().expect("tempdir");
    canonical_project(tmp.path());

    let report = validate::validate_project(tmp.path(), &ArchitectureContract::default())
        .expect("validate");
    assert!(report.ok, "unexpected violations: {:?}", report.violations);
    assert_eq!(report.blocking_count, 0);
    assert!(report.violations.is_empty());
    assert_eq!(report.graph.nodes, 8);
    assert_eq!(report.graph.edges, 9);
    assert_eq!(report.graph.cycles, 0);
    assert_eq!(report.fingerprint.len(), 64);
}

#[test]
fn validation_is_deterministic_and_read_only() {
    let tmp = tempdir().expect("tempdir");
    canonical_project(tmp.path());
    write(
        tmp.path(),
        "src/modules/users/helpers/format.ts",
        "export const f = 1;\nconsole.log(f);\n",
    );
    let contract = ArchitectureContract::default();

    let before = snapshot(tmp.path());
    let first = validate::validate_project(tmp.path(), &contract).expect("first run");
    let second = validate::validate_project(tmp.path(), &contract).expect("second run");
    let after = snapshot(tmp.path());

    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize")
    );
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(before, after);

    let g1 = graph::build_graph(tmp.path(), &contract).expect("graph");
    let g2 = graph::build_graph(tmp.path(), &contract).expect("graph");
    assert_eq!(g1.to_json(), g2.to_json());
}

#[test]
fn three_file_cycle_is_reported_once() {
    let tmp = tempdir().expect("tempdir");
    write(tmp.path(), "src/lib/a.ts", "import { b } from './b';\nexport const a = 1;\n");
    write(tmp.path(), "src/lib/b.ts", "import { c } from './c';\nexport const b = 1;\n");
    write(tmp.path(), "src/lib/c.ts", "import { a } from './a';\nexport const c = 1;\n");

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    assert_eq!(
        g.cycles,
        vec![vec![
            "src/lib/a.ts".to_string(),
            "src/lib/b.ts".to_string(),
            "src/lib/c.ts".to_string(),
            "src/lib/a.ts".to_string(),
        ]]
    );
    let cycles: Vec<_> = g
        .violations
        .iter()
        .filter(|v| v.rule_id == rules::GRAPH_CYCLE)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(
        cycles[0].target.as_deref(),
        Some("src/lib/a.ts -> src/lib/b.ts -> src/lib/c.ts -> src/lib/a.ts")
    );
}

#[test]
fn db_importing_service_breaks_layer_matrix() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/modules/users/service/users.service.ts",
        "export class UsersService {}\n",
    );
    write(
        tmp.path(),
        "src/db/client.ts",
        "import { UsersService } from '../modules/users/service/users.service';\n",
    );

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    let matrix: Vec<_> = g
        .violations
        .iter()
        .filter(|v| v.rule_id == rules::ARCH_LAYER_MATRIX)
        .collect();
    assert_eq!(matrix.len(), 1);
    assert_eq!(matrix[0].file, "src/db/client.ts");
    assert_eq!(
        matrix[0].target.as_deref(),
        Some("src/modules/users/service/users.service.ts")
    );
    assert_eq!(g.edges.len(), 1);
}

#[test]
fn path_alias_config_and_alias_imports_are_flagged() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "tsconfig.json",
        "{\n  // project config\n  \"compilerOptions\": {\n    \"baseUrl\": \".\",\n    \"paths\": { \"@/*\": [\"src/*\"] },\n  }\n}\n",
    );
    write(tmp.path(), "src/lib/util.ts", "export const u = 1;\n");
    write(
        tmp.path(),
        "src/app.ts",
        "import { u } from '@/lib/util';\nimport express from 'express';\n",
    );

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    let ids = rules_of(&g.violations);
    assert!(ids.contains(&rules::IMPORT_PATH_ALIAS_CONFIG));
    let non_relative: Vec<_> = g
        .violations
        .iter()
        .filter(|v| v.rule_id == rules::IMPORT_NON_RELATIVE)
        .collect();
    assert_eq!(non_relative.len(), 1);
    assert_eq!(non_relative[0].target.as_deref(), Some("@/lib/util"));
}

#[test]
fn unresolved_and_cross_module_imports() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/modules/users/repository/users.repository.ts",
        "export class UsersRepository {}\n",
    );
    write(
        tmp.path(),
        "src/modules/users/service/users.service.ts",
        "export class UsersService {}\n",
    );
    write(
        tmp.path(),
        "src/modules/orders/service/orders.service.ts",
        "import { UsersRepository } from '../../users/repository/users.repository';\nimport { UsersService } from '../../users/service/users.service';\nimport { gone } from './gone';\n",
    );

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    let ids = rules_of(&g.violations);
    assert_eq!(
        ids,
        vec![rules::ARCH_MODULE_ISOLATION, rules::IMPORT_MISSING_TARGET]
    );
    assert_eq!(
        g.violations[0].target.as_deref(),
        Some("src/modules/users/repository/users.repository.ts")
    );
    assert_eq!(g.violations[1].target.as_deref(), Some("./gone"));
}

#[test]
fn unknown_layers_and_top_level_dirs() {
    let tmp = tempdir().expect("tempdir");
    write(tmp.path(), "src/modules/users/helpers/x.ts", "export {};\n");
    write(tmp.path(), "src/weird/y.ts", "export {};\n");
    write(tmp.path(), "src/types/z.ts", "export {};\n");

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    assert_eq!(
        rules_of(&g.violations),
        vec![rules::ARCH_UNKNOWN_LAYER, rules::ARCH_UNKNOWN_TOP_LEVEL]
    );
    let node = g
        .nodes
        .iter()
        .find(|n| n.relative_path == "src/modules/users/helpers/x.ts")
        .expect("node");
    assert_eq!(node.layer, None);
    assert_eq!(node.unknown_layer.as_deref(), Some("helpers"));
}

#[test]
fn barrel_in_module_container_is_not_a_module() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/modules/users/repository/users.repository.ts",
        "export class UsersRepository {}\n",
    );
    write(
        tmp.path(),
        "src/modules/index.ts",
        "export * from './users/repository/users.repository';\n",
    );

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    assert!(g.violations.is_empty(), "{:?}", g.violations);
    assert_eq!(g.edges.len(), 1);
    let barrel = g
        .nodes
        .iter()
        .find(|n| n.relative_path == "src/modules/index.ts")
        .expect("barrel node");
    assert_eq!(barrel.module_name, None);
    assert_eq!(barrel.layer, None);
}

#[test]
fn relative_imports_may_leave_the_source_root() {
    let tmp = tempdir().expect("tempdir");
    write(tmp.path(), "package.json", "{\"name\": \"app\"}\n");
    write(tmp.path(), "prisma/seed.ts", "export const seed = 1;\n");
    write(
        tmp.path(),
        "src/app.ts",
        "import pkg from '../package.json';\nimport { seed } from '../prisma/seed';\nimport { gone } from '../scripts/gone';\n",
    );

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    let missing: Vec<_> = g
        .violations
        .iter()
        .filter(|v| v.rule_id == rules::IMPORT_MISSING_TARGET)
        .map(|v| v.target.as_deref())
        .collect();
    assert_eq!(missing, vec![Some("../scripts/gone")]);
    assert!(g.edges.is_empty());
    assert_eq!(g.nodes.len(), 1);
}

#[test]
fn branching_cycle_names_every_component_member() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/lib/a.ts",
        "import { b } from './b';\nimport { c } from './c';\n",
    );
    write(tmp.path(), "src/lib/b.ts", "import { a } from './a';\n");
    write(tmp.path(), "src/lib/c.ts", "import { a } from './a';\n");

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    assert_eq!(
        g.cycles,
        vec![vec![
            "src/lib/a.ts".to_string(),
            "src/lib/b.ts".to_string(),
            "src/lib/a.ts".to_string(),
        ]]
    );
    assert_eq!(rules_of(&g.violations), vec![rules::GRAPH_CYCLE]);
    let cycle = &g.violations[0];
    assert_eq!(
        cycle.target.as_deref(),
        Some("src/lib/a.ts -> src/lib/b.ts -> src/lib/a.ts")
    );
    assert!(
        cycle
            .message
            .ends_with("(component also includes src/lib/c.ts)"),
        "{}",
        cycle.message
    );
}

#[test]
fn module_tests_dirs_stay_out_of_the_graph() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "src/modules/users/service/users.service.ts",
        "export class UsersService {}\n",
    );
    write(
        tmp.path(),
        "src/modules/users/tests/fixtures.ts",
        "import { UsersService } from '../service/users.service';\n",
    );

    let g = graph::build_graph(tmp.path(), &ArchitectureContract::default()).expect("graph");
    assert!(g.violations.is_empty(), "{:?}", g.violations);
    assert_eq!(g.nodes.len(), 1);
    assert!(g.edges.is_empty());
}

#[test]
fn contract_override_allows_extra_top_level_dir() {
    let tmp = tempdir().expect("tempdir");
    write(tmp.path(), "src/weird/y.ts", "export {};\n");
    write(
        tmp.path(),
        ".archgate/contract.toml",
        "version = \"1.2.0\"\nallowedTopLevelDirs = [\"types\", \"weird\"]\n",
    );

    let contract = contract::load_contract(tmp.path(), None).expect("contract");
    assert_eq!(contract.version, "1.2.0");
    assert_eq!(contract.required_module_layers.len(), 6);
    let g = graph::build_graph(tmp.path(), &contract).expect("graph");
    assert!(g.violations.is_empty());
}

#[test]
fn missing_source_root_is_an_empty_graph() {
    let tmp = tempdir().expect("tempdir");
    let contract = ArchitectureContract::default();
    let g = graph::build_graph(tmp.path(), &contract).expect("graph");
    assert!(g.nodes.is_empty() && g.edges.is_empty() && g.violations.is_empty());

    let report = validate::validate_project(tmp.path(), &contract).expect("validate");
    assert!(!report.ok);
    assert_eq!(
        rules_of(&report.violations),
        vec![rules::STRUCTURE_SOURCE_ROOT_MISSING]
    );
}

#[test]
fn prisma_in_controller_is_an_ast_violation() {
    let tmp = tempdir().expect("tempdir");
    canonical_project(tmp.path());
    write(
        tmp.path(),
        "src/modules/users/controller/users.controller.ts",
        "import { PrismaClient } from '@prisma/client';\nimport { UsersService } from '../service/users.service';\nexport class UsersController {}\n",
    );

    let report = validate::validate_project(tmp.path(), &ArchitectureContract::default())
        .expect("validate");
    assert!(!report.ok);
    let ast: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.rule_id.starts_with("AST."))
        .collect();
    assert_eq!(ast.len(), 1);
    assert_eq!(ast[0].rule_id, rules::AST_PERSISTENCE_IN_LAYER);
    assert_eq!(ast[0].file, "src/modules/users/controller/users.controller.ts");
}

#[test]
fn classifier_orders_clusters_by_priority() {
    let tmp = tempdir().expect("tempdir");
    canonical_project(tmp.path());
    fs::remove_dir_all(tmp.path().join("src/modules/users/validation")).expect("rm layer");
    write(
        tmp.path(),
        "src/modules/users/controller/users.controller.ts",
        "export class UsersController {}\n",
    );
    let contract = ArchitectureContract::default();
    let report = validate::validate_project(tmp.path(), &contract).expect("validate");

    let checks = vec![
        report.as_check_result(),
        CheckResult {
            id: "typecheck".into(),
            status: CheckStatus::Fail,
            message: Some("tsc failed".into()),
            details: None,
        },
        CheckResult {
            id: "tests".into(),
            status: CheckStatus::Fail,
            message: None,
            details: None,
        },
    ];
    let profile = failure::classify_failures(&checks, &contract);
    assert_eq!(profile.reason, Some(FailureReason::Architecture));
    assert!(profile.should_auto_correct);
    assert!(!profile.architecture_collapse);
    let kinds: Vec<_> = profile.clusters.iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec!["architecture_contract", "typecheck_failure", "test_failure"]
    );
    assert_eq!(
        profile.clusters[0],
        FailureCluster::ArchitectureContract {
            modules: vec!["users".into()],
            missing_layers: vec!["validation".into()],
            unknown_layer_files: vec![],
        }
    );
    assert_eq!(profile.blocking_count, report.blocking_count + 2);

    let again = failure::classify_failures(&checks, &contract);
    assert_eq!(
        serde_json::to_value(&profile).expect("json"),
        serde_json::to_value(&again).expect("json")
    );
}

#[test]
fn classifier_collapse_and_runtime_signals() {
    let contract = ArchitectureContract::default();
    let arch = CheckResult {
        id: "architecture".into(),
        status: CheckStatus::Fail,
        message: None,
        details: Some(CheckDetails {
            violations: vec![
                Violation::error(rules::STRUCTURE_MODULE_MISSING_LAYER, "src/modules/users", "m")
                    .with_target("routes"),
                Violation::error(rules::ARCH_UNKNOWN_TOP_LEVEL, "src/weird/y.ts", "u")
                    .with_target("weird"),
                Violation::error(rules::ARCH_LAYER_MATRIX, "src/db/client.ts", "x")
                    .with_target("src/modules/users/service/users.service.ts"),
            ],
            blocking_count: Some(3),
            ..CheckDetails::default()
        }),
    };
    let boot = CheckResult {
        id: "boot".into(),
        status: CheckStatus::Fail,
        message: None,
        details: Some(CheckDetails {
            logs: Some("starting\nTypeError: app.use(...) is not a function\n".into()),
            exit_code: Some(1),
            ..CheckDetails::default()
        }),
    };
    let profile = failure::classify_failures(&[arch, boot], &contract);
    assert!(profile.architecture_collapse);
    assert_eq!(profile.blocking_count, 4);
    let kinds: Vec<_> = profile.clusters.iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "architecture_contract",
            "layer_boundary_violation",
            "runtime_middleware_api"
        ]
    );
    match &profile.clusters[1] {
        FailureCluster::LayerBoundaryViolation { edges, .. } => {
            assert_eq!(edges[0].source_layer, "db");
            assert_eq!(edges[0].target_layer, "service");
        }
        other => panic!("unexpected cluster {other:?}"),
    }
}

#[test]
fn unknown_check_ids_yield_zero_state() {
    let checks: Vec<CheckResult> = serde_json::from_value(serde_json::json!([
        { "id": "lint", "status": "fail", "message": "eslint failed" },
        { "id": "build", "status": "pass" }
    ]))
    .expect("checks");
    let profile = failure::classify_failures(&checks, &ArchitectureContract::default());
    assert!(!profile.should_auto_correct);
    assert!(profile.clusters.is_empty());
    assert_eq!(profile.blocking_count, 0);
    assert_eq!(profile.reason, None);
}

#[test]
fn boot_failures_pick_runtime_intents() {
    let contract = ArchitectureContract::default();
    let boot = |logs: &str| CheckResult {
        id: "boot".into(),
        status: CheckStatus::Fail,
        message: None,
        details: Some(CheckDetails {
            logs: Some(logs.into()),
            ..CheckDetails::default()
        }),
    };
    for (logs, intent) in [
        ("Error: P3009 migrate found failed migrations", CorrectionIntent::MigrationFailure),
        ("GET /health returned status 503", CorrectionIntent::RuntimeHealth),
        ("listen EADDRINUSE :::3000", CorrectionIntent::RuntimeBoot),
    ] {
        let checks = vec![boot(logs)];
        let profile = failure::classify_failures(&checks, &contract);
        assert_eq!(correction::infer_correction_intent(&profile, &checks), intent);
    }
}

#[test]
fn classified_failure_drives_a_compliant_correction() {
    let tmp = tempdir().expect("tempdir");
    canonical_project(tmp.path());
    write(
        tmp.path(),
        "src/db/client.ts",
        "import { UsersService } from '../modules/users/service/users.service';\n",
    );
    let contract = ArchitectureContract::default();
    let report = validate::validate_project(tmp.path(), &contract).expect("validate");
    let checks = vec![report.as_check_result()];
    let profile = failure::classify_failures(&checks, &contract);
    let intent = correction::infer_correction_intent(&profile, &checks);
    assert_eq!(intent, CorrectionIntent::ArchitectureViolation);

    let caps = CorrectionCaps::default();
    let constraint = correction::derive_constraint(intent, &caps);
    let mut step: CorrectionStepEvaluation = serde_json::from_value(serde_json::json!({
        "id": "architecture-correction-1",
        "input": { "_deepCorrection": {
            "phase": "architecture",
            "attempt": 1,
            "failedStepId": "validate",
            "classification": { "intent": intent.as_str() },
            "constraint": constraint,
        }},
        "status": "completed",
        "commitHash": "deadbeef",
        "resolvedConstraint": constraint,
        "maxFilesPerStep": caps.max_files_per_step,
        "maxTotalDiffBytes": caps.max_total_diff_bytes,
    }))
    .expect("step");
    step.output_payload = Some(StepOutputPayload {
        staged_diffs: vec![StagedDiff {
            path: "src/db/client.ts".into(),
            diff_preview: "- import { UsersService }".into(),
        }],
    });
    let result = correction::evaluate_correction_step(&step);
    assert!(result.ok, "{:?}", result.violations);

    step.output_payload = Some(StepOutputPayload {
        staged_diffs: vec![StagedDiff {
            path: ".env".into(),
            diff_preview: "SECRET=1".into(),
        }],
    });
    let result = correction::evaluate_correction_step(&step);
    assert!(!result.ok);
    assert!(result.has_rule(correction::rules::STAGED_PATHS_WITHIN_CONSTRAINT));

    step.status = Some(StepStatus::Failed);
    step.output_payload = None;
    let result = correction::evaluate_correction_step(&step);
    assert!(result.ok);
    assert_eq!(result.warning_count, 1);
}
