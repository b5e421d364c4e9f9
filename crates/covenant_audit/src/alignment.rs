//! Contract-to-code drift detection.

use covenant_protocol::{Action, Diagnostic, DiagnosticKind};
use std::collections::BTreeSet;

/// Compare the persisted contract's action set against the scanned one.
/// Empty result means the two are aligned.
pub fn check_alignment(contract_actions: &[Action], scanned_actions: &[Action]) -> Vec<Diagnostic> {
    let contract: BTreeSet<&str> = contract_actions.iter().map(|a| a.name.as_str()).collect();
    let scanned: BTreeSet<&str> = scanned_actions.iter().map(|a| a.name.as_str()).collect();

    let mut diagnostics = Vec::new();
    for name in contract.difference(&scanned) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DriftMissingInCode,
            format!("manifest#{}", name),
            format!("contract lists action '{}' but the source does not define it", name),
        ));
    }
    for name in scanned.difference(&contract) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DriftMissingInContract,
            format!("code#{}", name),
            format!("source defines action '{}' but the contract does not list it", name),
        ));
    }
    diagnostics
}
