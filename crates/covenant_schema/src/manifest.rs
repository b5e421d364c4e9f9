//! Contract document persistence.
//!
//! The contract lives at `<plugin root>/manifest.yaml`. Regeneration keeps
//! the existing `plugin_info` block so hand-edited identity fields survive
//! rescans; action records are always rebuilt wholesale.

use crate::error::{Result, SchemaError};
use covenant_protocol::{Action, Contract, PluginInfo};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the persisted contract inside a plugin root.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Path of the contract document for a plugin root.
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

/// Load the persisted contract, if any.
pub fn load_contract(root: &Path) -> Result<Contract> {
    let path = manifest_path(root);
    if !path.exists() {
        return Err(SchemaError::ManifestMissing(path.display().to_string()));
    }
    let raw = std::fs::read_to_string(&path)?;
    let contract = serde_yaml::from_str(&raw)?;
    Ok(contract)
}

/// Build a contract from freshly scanned actions, merging the persisted
/// `plugin_info` block when one exists.
///
/// Scan warnings are stripped: the persisted document describes the
/// contract, not the state of the source at scan time.
pub fn build_contract(root: &Path, actions: Vec<Action>) -> Contract {
    let dir_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin".to_string());
    let mut plugin_info = PluginInfo::for_directory(&dir_name);

    match load_contract(root) {
        Ok(existing) => {
            debug!(root = %root.display(), "Reusing persisted plugin_info");
            plugin_info = existing.plugin_info;
        }
        Err(SchemaError::ManifestMissing(_)) => {}
        Err(e) => {
            // A corrupt manifest does not block regeneration; identity
            // falls back to directory defaults.
            warn!(root = %root.display(), error = %e, "Ignoring unreadable manifest");
        }
    }

    let actions = actions
        .into_iter()
        .map(|mut action| {
            action.warnings.clear();
            action
        })
        .collect();

    Contract {
        plugin_info,
        actions,
    }
}

/// Persist a contract to `manifest.yaml`, returning the written path.
pub fn persist_contract(root: &Path, contract: &Contract) -> Result<PathBuf> {
    let path = manifest_path(root);
    let raw = serde_yaml::to_string(contract)?;
    std::fs::write(&path, raw)?;
    debug!(path = %path.display(), actions = contract.actions.len(), "Contract persisted");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_protocol::{
        ActionLocation, Diagnostic, DiagnosticKind, Properties, SchemaKind, SchemaNode,
    };
    use tempfile::TempDir;

    fn sample_action(name: &str) -> Action {
        Action {
            name: name.to_string(),
            category: "exec".into(),
            description: "does things".into(),
            location: ActionLocation {
                file: "tools/sample.py".into(),
                class_name: "Sample".into(),
            },
            input_schema: SchemaNode::object(Properties::new()),
            output_schema: SchemaNode::of_kind(SchemaKind::String),
            is_streaming: false,
            is_async: false,
            warnings: vec![Diagnostic::new(
                DiagnosticKind::MissingDocstring,
                "tools/sample.py:Sample.run",
                "method has no docstring",
            )],
        }
    }

    #[test]
    fn build_uses_directory_defaults_without_manifest() {
        let dir = TempDir::new().unwrap();
        let contract = build_contract(dir.path(), vec![sample_action("run")]);
        let dir_name = dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(contract.plugin_info.id, dir_name);
        assert_eq!(contract.plugin_info.version, "0.1.0");
    }

    #[test]
    fn build_strips_scan_warnings() {
        let dir = TempDir::new().unwrap();
        let contract = build_contract(dir.path(), vec![sample_action("run")]);
        assert!(contract.actions[0].warnings.is_empty());
    }

    #[test]
    fn persist_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let contract = build_contract(dir.path(), vec![sample_action("run")]);
        persist_contract(dir.path(), &contract).unwrap();

        let loaded = load_contract(dir.path()).unwrap();
        assert_eq!(loaded, contract);
    }

    #[test]
    fn regeneration_preserves_plugin_info() {
        let dir = TempDir::new().unwrap();
        let mut contract = build_contract(dir.path(), vec![sample_action("run")]);
        contract.plugin_info.version = "2.3.4".into();
        contract.plugin_info.description = "hand edited".into();
        persist_contract(dir.path(), &contract).unwrap();

        let regenerated = build_contract(dir.path(), vec![sample_action("other")]);
        assert_eq!(regenerated.plugin_info.version, "2.3.4");
        assert_eq!(regenerated.plugin_info.description, "hand edited");
        assert_eq!(regenerated.actions[0].name, "other");
    }

    #[test]
    fn corrupt_manifest_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(manifest_path(dir.path()), ":: not yaml ::[").unwrap();
        let contract = build_contract(dir.path(), vec![sample_action("run")]);
        assert_eq!(contract.plugin_info.version, "0.1.0");
    }

    #[test]
    fn missing_manifest_is_a_distinct_error() {
        let dir = TempDir::new().unwrap();
        match load_contract(dir.path()) {
            Err(SchemaError::ManifestMissing(_)) => {}
            other => panic!("expected ManifestMissing, got {:?}", other),
        }
    }

    #[test]
    fn wire_format_uses_original_field_names() {
        let dir = TempDir::new().unwrap();
        let contract = build_contract(dir.path(), vec![sample_action("run")]);
        persist_contract(dir.path(), &contract).unwrap();

        let raw = std::fs::read_to_string(manifest_path(dir.path())).unwrap();
        assert!(raw.contains("plugin_info"));
        assert!(raw.contains("inputSchema"));
        assert!(raw.contains("outputSchema"));
        assert!(raw.contains("class: Sample"));
    }
}
