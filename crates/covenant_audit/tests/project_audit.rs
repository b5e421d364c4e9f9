//! End-to-end audits over fixture plugin projects.

use covenant_audit::{AuditError, ContractValidator};
use covenant_protocol::{Action, ActionLocation, Contract, DiagnosticKind, PluginInfo, SchemaKind, SchemaNode};
use covenant_scanner::{ActionScanner, ScanConfig};
use covenant_schema::persist_contract;
use covenant_test_utils::{PluginProject, GREETER_SOURCE};

fn validator() -> ContractValidator {
    ContractValidator::with_scanner(ActionScanner::with_config(ScanConfig {
        use_cache: false,
        ..ScanConfig::default()
    }))
}

fn named_action(name: &str) -> Action {
    Action {
        name: name.to_string(),
        category: "exec".to_string(),
        description: "Does something.".to_string(),
        location: ActionLocation {
            file: "tools/p.py".to_string(),
            class_name: "P".to_string(),
        },
        input_schema: SchemaNode::object(Default::default()),
        output_schema: SchemaNode::of_kind(SchemaKind::String),
        is_streaming: false,
        is_async: false,
        warnings: Vec::new(),
    }
}

fn plugin_info() -> PluginInfo {
    PluginInfo {
        id: "fixture".to_string(),
        name: "Fixture".to_string(),
        version: "1.0.0".to_string(),
        description: "Fixture plugin.".to_string(),
    }
}

#[test]
fn generate_persist_audit_round_trip_has_zero_drift() {
    let project = PluginProject::greeter().unwrap();
    let validator = validator();

    let contract = validator.generate(project.root()).unwrap();
    assert_eq!(contract.action_names(), vec!["greet"]);
    persist_contract(project.root(), &contract).unwrap();

    let report = validator.audit(project.root()).unwrap();
    assert!(report.passed, "diagnostics: {:?}", report.diagnostics);
    assert!(!report.diagnostics.iter().any(|d| matches!(
        d.kind,
        DiagnosticKind::DriftMissingInCode | DiagnosticKind::DriftMissingInContract
    )));
}

#[test]
fn misaligned_contract_reports_both_drift_kinds_and_fails() {
    let project = PluginProject::builder()
        .tool(
            "bar.py",
            r#"
class P(BasePlugin):
    @action
    def bar(self, x: Annotated[int, "X"]) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#,
        )
        .build()
        .unwrap();
    let contract = Contract {
        plugin_info: plugin_info(),
        actions: vec![named_action("foo")],
    };
    persist_contract(project.root(), &contract).unwrap();

    let report = validator().audit(project.root()).unwrap();
    assert!(!report.passed);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::DriftMissingInCode && d.message.contains("foo")));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::DriftMissingInContract && d.message.contains("bar")));
}

#[test]
fn unannotated_parameter_fails_the_audit() {
    let project = PluginProject::builder()
        .tool(
            "p.py",
            r#"
class P(BasePlugin):
    @action
    def run(self, raw) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#,
        )
        .build()
        .unwrap();
    let validator = validator();
    let contract = Contract {
        plugin_info: plugin_info(),
        actions: vec![named_action("run")],
    };
    persist_contract(project.root(), &contract).unwrap();

    let report = validator.audit(project.root()).unwrap();
    assert!(!report.passed);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::MissingTypeAnnotation));
}

#[test]
fn generate_refuses_non_compliant_code() {
    let project = PluginProject::builder()
        .tool(
            "p.py",
            r#"
class P(BasePlugin):
    @action
    def run(self, raw) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#,
        )
        .build()
        .unwrap();
    let err = validator().generate(project.root());
    match err {
        Err(AuditError::ComplianceFailure(diagnostics)) => {
            assert_eq!(diagnostics.len(), 1);
        }
        other => panic!("expected compliance failure, got {:?}", other.map(|c| c.action_names().len())),
    }
}

#[test]
fn missing_contract_fails_the_audit() {
    let project = PluginProject::greeter().unwrap();
    let report = validator().audit(project.root()).unwrap();
    assert!(!report.passed);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.location == "manifest.yaml" && d.message.contains("not found")));
}

#[test]
fn dangerous_calls_are_advisory_only() {
    let source = r#"
import os
from covenant_sdk import BasePlugin, action
from typing import Annotated


class Shell(BasePlugin):
    @action
    def run(self, cmd: Annotated[str, "Command name"]) -> Annotated[str, "Output"]:
        """Run a known command."""
        return os.system(cmd)
"#;
    let project = PluginProject::builder().tool("shell.py", source).build().unwrap();
    let validator = validator();
    let contract = validator.generate(project.root()).unwrap();
    persist_contract(project.root(), &contract).unwrap();

    let report = validator.audit(project.root()).unwrap();
    assert!(report.passed, "diagnostics: {:?}", report.diagnostics);
    let warnings: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::SecurityWarning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].location.starts_with("tools/shell.py:"));
}

#[test]
fn loose_requirements_fail_the_audit() {
    let project = PluginProject::builder()
        .tool("greeter.py", GREETER_SOURCE)
        .requirements("requests==2.31.0\npandas\n# comment\nnumpy>=1.26\n")
        .build()
        .unwrap();
    let validator = validator();
    let contract = validator.generate(project.root()).unwrap();
    persist_contract(project.root(), &contract).unwrap();

    let report = validator.audit(project.root()).unwrap();
    assert!(!report.passed);
    let offenders: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::DependencyFormat)
        .collect();
    assert_eq!(offenders.len(), 1);
    assert_eq!(offenders[0].location, "requirements.txt:2");
}
