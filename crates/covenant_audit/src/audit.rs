//! Full plugin project audit.
//!
//! Every sub-check always runs; the report carries everything found.
//! An audit passes iff no non-advisory diagnostic was produced.

use crate::alignment::check_alignment;
use crate::error::{AuditError, Result};
use covenant_protocol::{Contract, Diagnostic, DiagnosticKind};
use covenant_schema::{check_schema, load_contract, SchemaError};
use covenant_scanner::{ActionScanner, ScanOutcome};
use ignore::WalkBuilder;
use std::fs;
use std::path::Path;
use tracing::info;

/// Call substrings the textual security scan looks for.
const DANGEROUS_CALLS: &[&str] = &["os.system", "subprocess.call", "eval(", "exec("];

/// Version constraint operators accepted in `requirements.txt`.
const CONSTRAINT_OPS: &[&str] = &["==", ">=", "<=", "~="];

/// Outcome of a full project audit.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub passed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl AuditReport {
    fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let passed = diagnostics.iter().all(|d| d.kind.is_advisory());
        Self { passed, diagnostics }
    }

    /// Diagnostics that actually fail the audit.
    pub fn blocking(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.kind.is_advisory())
    }
}

/// Audits plugin projects against their persisted contracts.
#[derive(Debug, Clone, Default)]
pub struct ContractValidator {
    scanner: ActionScanner,
}

impl ContractValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scanner(scanner: ActionScanner) -> Self {
        Self { scanner }
    }

    /// Run every check over the project. Sub-checks never short-circuit
    /// each other: a drifted contract still gets its security and
    /// dependency findings reported.
    pub fn audit(&self, root: &Path) -> Result<AuditReport> {
        info!(root = %root.display(), "Auditing plugin project");
        let mut diagnostics = Vec::new();

        let scan = self.scanner.scan(root)?;
        diagnostics.extend(scan.diagnostics.iter().cloned());

        let contract = match load_contract(root) {
            Ok(contract) => Some(contract),
            Err(SchemaError::ManifestMissing(_)) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::SchemaMalformed,
                    "manifest.yaml",
                    "contract document not found",
                ));
                None
            }
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::SchemaMalformed,
                    "manifest.yaml",
                    format!("contract document unreadable: {}", e),
                ));
                None
            }
        };

        if let Some(contract) = &contract {
            diagnostics.extend(check_contract_document(contract));
            diagnostics.extend(check_alignment(&contract.actions, &scan.actions));
            for action in &contract.actions {
                diagnostics.extend(check_schema(
                    &action.input_schema,
                    &format!("{}.inputSchema", action.name),
                ));
                diagnostics.extend(check_schema(
                    &action.output_schema,
                    &format!("{}.outputSchema", action.name),
                ));
            }
        }

        diagnostics.extend(check_security(root)?);
        diagnostics.extend(check_requirements(root)?);

        let report = AuditReport::from_diagnostics(diagnostics);
        info!(
            passed = report.passed,
            diagnostics = report.diagnostics.len(),
            "Audit complete"
        );
        Ok(report)
    }

    /// Generate a fresh contract from the code. Refuses when annotation
    /// compliance fails: a contract must never be built from schemas the
    /// author has not finished describing.
    pub fn generate(&self, root: &Path) -> Result<Contract> {
        let scan = self.scanner.scan(root)?;
        let compliance = compliance_failures(&scan);
        if !compliance.is_empty() {
            return Err(AuditError::ComplianceFailure(compliance));
        }
        Ok(covenant_schema::build_contract(root, scan.actions))
    }
}

fn compliance_failures(scan: &ScanOutcome) -> Vec<Diagnostic> {
    scan.diagnostics
        .iter()
        .filter(|d| {
            matches!(
                d.kind,
                DiagnosticKind::MissingTypeAnnotation
                    | DiagnosticKind::MissingDescription
                    | DiagnosticKind::ParseFailure
                    | DiagnosticKind::EnrichmentFailure
            )
        })
        .cloned()
        .collect()
}

/// Structural checks on the contract document itself.
pub fn check_contract_document(contract: &Contract) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let info = &contract.plugin_info;
    for (field, value) in [
        ("id", &info.id),
        ("name", &info.name),
        ("version", &info.version),
        ("description", &info.description),
    ] {
        if value.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::SchemaMalformed,
                format!("manifest.yaml#plugin_info.{}", field),
                format!("plugin_info.{} is empty", field),
            ));
        }
    }
    if contract.actions.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::SchemaMalformed,
            "manifest.yaml#actions",
            "contract declares no actions",
        ));
    }
    diagnostics
}

/// Textual scan of `tools/` sources for dangerous call patterns.
/// Findings are advisory: they flag code for review, not rejection.
pub fn check_security(root: &Path) -> Result<Vec<Diagnostic>> {
    let tools = root.join("tools");
    let mut diagnostics = Vec::new();
    if !tools.is_dir() {
        return Ok(diagnostics);
    }

    let walker = WalkBuilder::new(&tools)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| {
            AuditError::Io(std::io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|ft| ft.is_file())
            || path.extension().and_then(|ext| ext.to_str()) != Some("py")
        {
            continue;
        }
        let source = fs::read_to_string(path)?;
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        for (line_no, line) in source.lines().enumerate() {
            for pattern in DANGEROUS_CALLS {
                if line.contains(pattern) {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::SecurityWarning,
                        format!("{}:{}", rel, line_no + 1),
                        format!("potentially dangerous call '{}'", pattern),
                    ));
                }
            }
        }
    }
    Ok(diagnostics)
}

/// Every dependency in `requirements.txt` must pin a version constraint.
/// A missing file is fine; a present file with loose entries is not.
pub fn check_requirements(root: &Path) -> Result<Vec<Diagnostic>> {
    let path = root.join("requirements.txt");
    let mut diagnostics = Vec::new();
    if !path.is_file() {
        return Ok(diagnostics);
    }

    let contents = fs::read_to_string(&path)?;
    for (line_no, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if !CONSTRAINT_OPS.iter().any(|op| line.contains(op)) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DependencyFormat,
                format!("requirements.txt:{}", line_no + 1),
                format!("dependency '{}' has no version constraint", line),
            ));
        }
    }
    Ok(diagnostics)
}
