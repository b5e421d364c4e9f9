//! Plugin project fixtures.
//!
//! Builds throwaway plugin project directories (tools/, libs/,
//! requirements.txt, manifest.yaml) for scanner, audit, and contract
//! tests. The directory is removed when the fixture drops.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A canned well-formed plugin source with a single `greet` action.
pub const GREETER_SOURCE: &str = r#"
from covenant_sdk import BasePlugin, action
from typing import Annotated


class Greeter(BasePlugin):
    @action
    def greet(self, name: Annotated[str, "Name of the person to greet"]) -> Annotated[str, "The greeting"]:
        """Produce a greeting."""
        return f"Hello, {name}!"
"#;

/// A streaming plugin source producing row dictionaries.
pub const EXPORTER_SOURCE: &str = r#"
from covenant_sdk import BasePlugin, action
from typing import Annotated


class Exporter(BasePlugin):
    @action(category="transform", stream=True)
    async def export(self, limit: Annotated[int, "Maximum row count"] = 100) -> Annotated[list, "Rows"]:
        """Stream exported rows."""
        yield {}
"#;

/// A temporary plugin project directory.
pub struct PluginProject {
    dir: TempDir,
}

impl PluginProject {
    pub fn builder() -> PluginProjectBuilder {
        PluginProjectBuilder::default()
    }

    /// A ready-made project containing only the greeter plugin.
    pub fn greeter() -> Result<Self> {
        Self::builder().tool("greeter.py", GREETER_SOURCE).build()
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write or replace a file under the project root.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        write_file(self.dir.path(), rel, contents)
    }
}

#[derive(Default)]
pub struct PluginProjectBuilder {
    tools: Vec<(String, String)>,
    libs: Vec<(String, String)>,
    requirements: Option<String>,
    manifest: Option<String>,
}

impl PluginProjectBuilder {
    /// Add a source file under `tools/`.
    pub fn tool(mut self, name: &str, source: &str) -> Self {
        self.tools.push((name.to_string(), source.to_string()));
        self
    }

    /// Add a shared declaration file under `libs/`.
    pub fn lib(mut self, name: &str, source: &str) -> Self {
        self.libs.push((name.to_string(), source.to_string()));
        self
    }

    pub fn requirements(mut self, contents: &str) -> Self {
        self.requirements = Some(contents.to_string());
        self
    }

    pub fn manifest(mut self, contents: &str) -> Self {
        self.manifest = Some(contents.to_string());
        self
    }

    pub fn build(self) -> Result<PluginProject> {
        let dir = TempDir::new().context("Failed to create fixture directory")?;
        let root = dir.path();
        for (name, source) in &self.tools {
            write_file(root, &format!("tools/{}", name), source)?;
        }
        for (name, source) in &self.libs {
            write_file(root, &format!("libs/{}", name), source)?;
        }
        if let Some(contents) = &self.requirements {
            write_file(root, "requirements.txt", contents)?;
        }
        if let Some(contents) = &self.manifest {
            write_file(root, "manifest.yaml", contents)?;
        }
        Ok(PluginProject { dir })
    }
}

fn write_file(root: &Path, rel: &str, contents: &str) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_lays_out_the_project() {
        let project = PluginProject::builder()
            .tool("greeter.py", GREETER_SOURCE)
            .lib("models.py", "class User:\n    name: str\n")
            .requirements("requests==2.31.0\n")
            .build()
            .unwrap();
        assert!(project.root().join("tools/greeter.py").is_file());
        assert!(project.root().join("libs/models.py").is_file());
        assert!(project.root().join("requirements.txt").is_file());
        assert!(!project.root().join("manifest.yaml").exists());
    }
}
