//! `abiforge.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Manifest file name searched for from the working directory upward.
pub const MANIFEST_FILE: &str = "abiforge.toml";

/// The top-level manifest structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiforgeManifest {
    /// Project metadata (required).
    pub project: ProjectConfig,
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

/// The native module being built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Entry point handed to the build tool (package path or directory).
    #[serde(default)]
    pub entry: Option<String>,
    /// Artifact file name, identical for every ABI.
    #[serde(default)]
    pub artifact: Option<String>,
}

/// Build section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Build tool executable (default `go`).
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    /// Subset of catalog targets to build; empty means all.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Custom target catalog (`[[target]]` tables), relative to the project.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Parallel build slots; 1 or unset builds sequentially.
    #[serde(default)]
    pub jobs: Option<usize>,
}

/// Toolchain section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolchainConfig {
    #[serde(default)]
    pub ndk_home: Option<PathBuf>,
}

/// Verification section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fail the build on any verification warning.
    #[serde(default)]
    pub strict: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Default output directory, relative to the project.
pub const DEFAULT_OUT_DIR: &str = "out";

impl AbiforgeManifest {
    /// Search upward from `start_dir` for an `abiforge.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: AbiforgeManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing abiforge.toml")
    }

    /// Artifact name: explicit, or `lib<project>.so`.
    pub fn artifact_name(&self) -> String {
        self.module
            .artifact
            .clone()
            .unwrap_or_else(|| format!("lib{}.so", self.project.name))
    }

    /// Output directory resolved against the project directory.
    pub fn out_dir(&self, project_dir: &Path) -> PathBuf {
        let out = self
            .build
            .out_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
        project_dir.join(out)
    }

    /// Generate the default template for `abiforge init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"[project]
name = "{name}"

[module]
entry = "./cmd/{name}"
artifact = "lib{name}.so"

[build]
tool = "go"
tags = ["android"]
out-dir = "out/jniLibs"

[verify]
strict = false
"#
        )
    }
}

/// Output directory for a project with or without a manifest.
pub fn resolve_out_dir(project_dir: &Path, manifest: Option<&AbiforgeManifest>) -> PathBuf {
    match manifest {
        Some(m) => m.out_dir(project_dir),
        None => project_dir.join(DEFAULT_OUT_DIR),
    }
}
