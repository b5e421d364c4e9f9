//! Two-phase action discovery.
//!
//! Phase one parses every candidate source file in parallel; the workers
//! only read and never touch shared state. Phase two runs strictly
//! sequentially: it builds the nominal type catalog (shared `libs/`
//! declarations first, then the file's own, which shadow) and compiles
//! every discovered action's annotations into schemas. The split exists
//! because enrichment order is observable through type shadowing.

use crate::cache::{mtime_millis, ScanCache};
use crate::error::{Result, ScanError};
use crate::parse::{self, ParsedModule, ParsedNominal};
use crate::pytypes;
use covenant_protocol::{
    Action, ActionLocation, Diagnostic, DiagnosticKind, Properties, SchemaKind, SchemaNode,
};
use covenant_schema::{resolver, FieldDescriptor, InMemoryCatalog, NominalType, TypeDescriptor};
use ignore::WalkBuilder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Directory of action-bearing sources inside a plugin project.
const TOOLS_DIR: &str = "tools";
/// Directory of shared nominal type declarations.
const LIBS_DIR: &str = "libs";

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Parse workers for the syntax pass (0 = auto-detect CPU count).
    pub threads: usize,
    /// Whether to consult and refresh the scan cache.
    pub use_cache: bool,
    /// Cache directory override; defaults to `~/.covenant/cache/scanner`.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            use_cache: true,
            cache_dir: None,
        }
    }
}

/// Scan statistics for logging and cache-behavior assertions.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Files read and parsed this scan. Zero on a cache hit.
    pub files_parsed: usize,
    pub actions_found: usize,
    pub duration_ms: u64,
}

/// Result of one project scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub actions: Vec<Action>,
    pub diagnostics: Vec<Diagnostic>,
    /// True when the result came from the cache verbatim.
    pub cache_hit: bool,
    pub stats: ScanStats,
}

/// Discovers actions in a plugin project directory.
#[derive(Debug, Clone, Default)]
pub struct ActionScanner {
    config: ScanConfig,
}

/// One file's syntax-pass result, tagged with its candidate index so the
/// sequential phase can restore deterministic order.
struct FileParse {
    index: usize,
    module: std::result::Result<ParsedModule, String>,
}

impl ActionScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    fn cache(&self) -> ScanCache {
        match &self.config.cache_dir {
            Some(dir) => ScanCache::new(dir.clone()),
            None => ScanCache::default_location(),
        }
    }

    /// Scan a plugin project rooted at `root`.
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome> {
        let start = Instant::now();
        if !root.is_dir() {
            return Err(ScanError::ProjectNotFound(root.to_path_buf()));
        }
        let root = root.canonicalize()?;
        info!(root = %root.display(), "Scanning plugin project");

        let candidates = collect_sources(&root.join(TOOLS_DIR), &root)?;
        // The validity snapshot covers libs/ too: shared declarations
        // shape every resolved schema, so an edit there must miss.
        let shared = collect_sources(&root.join(LIBS_DIR), &root)?;
        let mut file_mtimes = BTreeMap::new();
        for rel in candidates.iter().chain(shared.iter()) {
            file_mtimes.insert(rel.clone(), mtime_millis(&root.join(rel))?);
        }

        let cache = self.cache();
        if self.config.use_cache {
            if let Some(snapshot) = cache.load(&root) {
                if snapshot.is_valid_for(&file_mtimes) {
                    debug!(root = %root.display(), "Scan cache hit");
                    let stats = ScanStats {
                        files_parsed: 0,
                        actions_found: snapshot.actions.len(),
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                    return Ok(ScanOutcome {
                        actions: snapshot.actions,
                        diagnostics: snapshot.diagnostics,
                        cache_hit: true,
                        stats,
                    });
                }
            }
        }

        let mut diagnostics = Vec::new();

        // Phase one: parallel syntax pass over candidate files.
        let parses = self.parse_files(&root, &candidates)?;
        let mut modules: Vec<(String, ParsedModule)> = Vec::new();
        for parse in parses {
            let rel = candidates[parse.index].clone();
            match parse.module {
                Ok(module) => modules.push((rel, module)),
                Err(message) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ParseFailure,
                        rel.clone(),
                        message,
                    ));
                }
            }
        }

        // Phase two: sequential enrichment. Shared declarations load
        // before any file's own, and later libs files shadow earlier
        // ones, so catalog construction order is part of the contract.
        let base_catalog = self.load_shared_catalog(&root, &mut diagnostics);
        let mut actions = Vec::new();
        for (rel, module) in &modules {
            let mut catalog = base_catalog.clone();
            for nominal in &module.nominals {
                catalog.insert(to_nominal(nominal));
            }
            for class in &module.plugin_classes {
                for method in &class.methods {
                    let action = enrich_method(rel, &class.name, method, &catalog);
                    diagnostics.extend(action.warnings.iter().cloned());
                    actions.push(action);
                }
            }
        }

        if self.config.use_cache {
            if let Err(e) = cache.store(&root, file_mtimes, &actions, &diagnostics) {
                warn!(root = %root.display(), error = %e, "Failed to write scan cache");
            }
        }

        let stats = ScanStats {
            files_parsed: candidates.len(),
            actions_found: actions.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            files = stats.files_parsed,
            actions = stats.actions_found,
            diagnostics = diagnostics.len(),
            duration_ms = stats.duration_ms,
            "Scan complete"
        );

        Ok(ScanOutcome {
            actions,
            diagnostics,
            cache_hit: false,
            stats,
        })
    }

    /// Drop the cache entry for a project.
    pub fn clear_cache(&self, root: &Path) -> Result<()> {
        let root = root.canonicalize()?;
        self.cache().clear(&root)
    }

    fn parse_files(&self, root: &Path, candidates: &[String]) -> Result<Vec<FileParse>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let workers = match self.config.threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            n => n,
        }
        .min(candidates.len());

        let paths: Arc<Vec<PathBuf>> =
            Arc::new(candidates.iter().map(|rel| root.join(rel)).collect());
        let next = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel::<FileParse>();

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let paths = paths.clone();
            let next = next.clone();
            let tx = tx.clone();
            handles.push(std::thread::spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                if index >= paths.len() {
                    break;
                }
                let module = std::fs::read_to_string(&paths[index])
                    .map_err(|e| e.to_string())
                    .and_then(|source| {
                        parse::parse_module(&source).map_err(|e| e.to_string())
                    });
                if tx.send(FileParse { index, module }).is_err() {
                    break;
                }
            }));
        }
        drop(tx);

        let mut parses: Vec<FileParse> = rx.iter().collect();
        for handle in handles {
            handle
                .join()
                .map_err(|_| ScanError::Internal("parse worker panicked".to_string()))?;
        }
        parses.sort_by_key(|parse| parse.index);
        Ok(parses)
    }

    /// Parse `libs/` declarations into the scan-wide catalog.
    fn load_shared_catalog(
        &self,
        root: &Path,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        let libs = root.join(LIBS_DIR);
        if !libs.is_dir() {
            return catalog;
        }
        let sources = match collect_sources(&libs, root) {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "Failed to walk libs directory");
                return catalog;
            }
        };
        for rel in sources {
            let outcome = std::fs::read_to_string(root.join(&rel))
                .map_err(|e| e.to_string())
                .and_then(|source| parse::parse_module(&source).map_err(|e| e.to_string()));
            match outcome {
                Ok(module) => {
                    for nominal in &module.nominals {
                        catalog.insert(to_nominal(nominal));
                    }
                }
                Err(message) => {
                    // Shared declarations failing to load is an
                    // enrichment problem, not a candidate parse failure;
                    // it belongs to no action and scanning continues.
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::EnrichmentFailure,
                        rel,
                        message,
                    ));
                }
            }
        }
        catalog
    }
}

/// Candidate source files under `dir`, as forward-slash paths relative to
/// `root`, sorted. Dunder-named files are not candidates.
fn collect_sources(dir: &Path, root: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut sources = Vec::new();
    let walker = WalkBuilder::new(dir)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .build();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("py") {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if name.starts_with("__") {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        sources.push(forward_slashes(rel));
    }
    sources.sort();
    Ok(sources)
}

fn forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn to_nominal(parsed: &ParsedNominal) -> NominalType {
    NominalType {
        name: parsed.name.clone(),
        fields: parsed
            .fields
            .iter()
            .map(|field| FieldDescriptor {
                name: field.name.clone(),
                descriptor: pytypes::parse_annotation(&field.annotation),
                default: field.default.as_deref().map(pytypes::parse_literal),
            })
            .collect(),
    }
}

/// Compile one discovered method into an [`Action`], collecting its
/// annotation-compliance warnings.
fn enrich_method(
    rel: &str,
    class_name: &str,
    method: &parse::ParsedMethod,
    catalog: &InMemoryCatalog,
) -> Action {
    let mut warnings = Vec::new();
    let method_location = format!("{}:{}.{}", rel, class_name, method.name);

    let mut properties = Properties::new();
    for param in &method.params {
        let location = format!("{}#{}", method_location, param.name);
        let descriptor = match &param.annotation {
            Some(annotation) => pytypes::parse_annotation(annotation),
            None => TypeDescriptor::Unannotated,
        };
        if param.annotation.is_none() {
            warnings.push(Diagnostic::new(
                DiagnosticKind::MissingTypeAnnotation,
                location.clone(),
                format!("parameter '{}' has no type annotation", param.name),
            ));
        } else if !descriptor.has_description() {
            warnings.push(Diagnostic::new(
                DiagnosticKind::MissingDescription,
                location.clone(),
                format!("parameter '{}' has no description", param.name),
            ));
        }
        let default = param.default.as_deref().map(pytypes::parse_literal);
        let node = resolver::resolve_field(catalog, &descriptor, default.as_ref());
        properties.insert(param.name.clone(), node);
    }
    let input_schema = SchemaNode::object(properties);

    let output_schema = match &method.return_annotation {
        Some(annotation) => resolver::resolve(catalog, &pytypes::parse_annotation(annotation)),
        None => {
            warnings.push(Diagnostic::new(
                DiagnosticKind::MissingReturnType,
                method_location.clone(),
                "method has no return annotation".to_string(),
            ));
            SchemaNode::of_kind(SchemaKind::Object)
        }
    };

    let description = method.docstring.clone().unwrap_or_default();
    if description.trim().is_empty() {
        warnings.push(Diagnostic::new(
            DiagnosticKind::MissingDocstring,
            method_location.clone(),
            "method has no docstring".to_string(),
        ));
    }
    if method.is_streaming && !method.is_async {
        warnings.push(Diagnostic::new(
            DiagnosticKind::MissingAsyncMarker,
            method_location,
            "streaming action is not declared async".to_string(),
        ));
    }

    Action {
        name: method.name.clone(),
        category: method.category.clone(),
        description,
        location: ActionLocation {
            file: rel.to_string(),
            class_name: class_name.to_string(),
        },
        input_schema,
        output_schema,
        is_streaming: method.is_streaming,
        is_async: method.is_async,
        warnings,
    }
}

/// Helper for callers that only need a quick compliance answer.
pub fn has_blocking_diagnostics(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| !d.kind.is_advisory())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scan_fixture(files: &[(&str, &str)]) -> ScanOutcome {
        let dir = tempfile::tempdir().unwrap();
        for (rel, contents) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
        let scanner = ActionScanner::with_config(ScanConfig {
            use_cache: false,
            ..ScanConfig::default()
        });
        scanner.scan(dir.path()).unwrap()
    }

    const GREETER: &str = r#"
from covenant_sdk import BasePlugin, action
from typing import Annotated


class Greeter(BasePlugin):
    @action
    def greet(self, name: Annotated[str, "Name of the person to greet"]) -> Annotated[str, "The greeting"]:
        """Produce a greeting."""
        return f"Hello, {name}!"
"#;

    #[test]
    fn greet_scenario() {
        let outcome = scan_fixture(&[("tools/greeter.py", GREETER)]);
        assert_eq!(outcome.actions.len(), 1);
        assert!(!outcome.cache_hit);

        let action = &outcome.actions[0];
        assert_eq!(action.name, "greet");
        assert_eq!(action.category, "exec");
        assert_eq!(action.location.file, "tools/greeter.py");
        assert_eq!(action.location.class_name, "Greeter");
        assert!(action.warnings.is_empty());

        let name = action.input_schema.properties.as_ref().unwrap().get("name").unwrap();
        assert_eq!(name.kind, SchemaKind::String);
        assert_eq!(name.description, "Name of the person to greet");
        assert_eq!(name.required, Some(true));

        assert_eq!(action.output_schema.kind, SchemaKind::String);
        assert_eq!(action.output_schema.description, "The greeting");
        assert!(action.output_schema.required.is_none());
    }

    #[test]
    fn unannotated_param_gets_exactly_one_diagnostic() {
        let source = r#"
class P(BasePlugin):
    @action
    def run(self, raw) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#;
        let outcome = scan_fixture(&[("tools/p.py", source)]);
        let offenders: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.location.ends_with("#raw"))
            .collect();
        assert_eq!(offenders.len(), 1);
        assert_eq!(offenders[0].kind, DiagnosticKind::MissingTypeAnnotation);
    }

    #[test]
    fn description_less_param_gets_exactly_one_diagnostic() {
        let source = r#"
class P(BasePlugin):
    @action
    def run(self, count: int) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#;
        let outcome = scan_fixture(&[("tools/p.py", source)]);
        let offenders: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.location.ends_with("#count"))
            .collect();
        assert_eq!(offenders.len(), 1);
        assert_eq!(offenders[0].kind, DiagnosticKind::MissingDescription);
    }

    #[test]
    fn raw_dict_parameter_is_invalid() {
        let source = r#"
class P(BasePlugin):
    @action
    def run(self, payload: Annotated[dict, "Payload"]) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#;
        let outcome = scan_fixture(&[("tools/p.py", source)]);
        let payload = outcome.actions[0]
            .input_schema
            .properties
            .as_ref()
            .unwrap()
            .get("payload")
            .unwrap();
        assert!(payload.is_invalid());
    }

    #[test]
    fn nominal_types_resolve_across_libs() {
        let lib = r#"
class Address:
    street: Annotated[str, "Street"]
    zip_code: Annotated[str, "Zip"] = "00000"
"#;
        let tool = r#"
class P(BasePlugin):
    @action
    def locate(self, address: Annotated[Address, "Where"]) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#;
        let outcome = scan_fixture(&[("libs/models.py", lib), ("tools/p.py", tool)]);
        let address = outcome.actions[0]
            .input_schema
            .properties
            .as_ref()
            .unwrap()
            .get("address")
            .unwrap();
        assert_eq!(address.kind, SchemaKind::Object);
        assert_eq!(address.required_fields, Some(vec!["street".to_string()]));
        let zip = address.properties.as_ref().unwrap().get("zip_code").unwrap();
        assert_eq!(zip.default, Some(json!("00000")));
    }

    #[test]
    fn file_local_nominals_shadow_libs() {
        let lib = "class Point:\n    x: Annotated[int, \"X\"]\n";
        let tool = r#"
class Point:
    x: Annotated[int, "X"]
    y: Annotated[int, "Y"]


class P(BasePlugin):
    @action
    def plot(self, point: Annotated[Point, "A point"]) -> Annotated[str, "Out"]:
        """Doc."""
        return ""
"#;
        let outcome = scan_fixture(&[("libs/geo.py", lib), ("tools/p.py", tool)]);
        let point = outcome.actions[0]
            .input_schema
            .properties
            .as_ref()
            .unwrap()
            .get("point")
            .unwrap();
        assert_eq!(point.properties.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn parse_failure_skips_file_and_reports() {
        let broken = "class P(BasePlugin):\n    @action\n    def broken(self, x: int";
        let outcome = scan_fixture(&[("tools/broken.py", broken), ("tools/greeter.py", GREETER)]);
        assert_eq!(outcome.actions.len(), 1);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ParseFailure
                && d.location == "tools/broken.py"));
    }

    #[test]
    fn broken_libs_file_is_an_enrichment_failure() {
        let broken_lib = "\"\"\"Shared models.\nclass Address:\n    street: Annotated[str, \"Street\"]\n";
        let outcome = scan_fixture(&[("libs/models.py", broken_lib), ("tools/greeter.py", GREETER)]);
        // The scan still completes; the shared declarations just never
        // make it into the catalog.
        assert_eq!(outcome.actions.len(), 1);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::EnrichmentFailure
                && d.location == "libs/models.py"));
    }

    #[test]
    fn dunder_files_are_not_candidates() {
        let outcome = scan_fixture(&[
            ("tools/__init__.py", "raise RuntimeError('never parsed')"),
            ("tools/greeter.py", GREETER),
        ]);
        assert_eq!(outcome.stats.files_parsed, 1);
        assert_eq!(outcome.actions.len(), 1);
    }

    #[test]
    fn streaming_sync_method_is_advisory_only() {
        let source = r#"
class P(BasePlugin):
    @action(stream=True)
    def pump(self) -> Annotated[list, "Rows"]:
        """Doc."""
        yield {}
"#;
        let outcome = scan_fixture(&[("tools/p.py", source)]);
        let advisory: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::MissingAsyncMarker)
            .collect();
        assert_eq!(advisory.len(), 1);
        assert!(!has_blocking_diagnostics(&outcome.diagnostics));
    }

    #[test]
    fn missing_project_is_an_error() {
        let scanner = ActionScanner::new();
        let err = scanner.scan(Path::new("/nonexistent/plugin/project"));
        assert!(matches!(err, Err(ScanError::ProjectNotFound(_))));
    }
}
