//! The build target catalog.
//!
//! Each entry is declarative data: an architecture, the ABI directory its
//! artifact lands in, the NDK compiler wrappers for it, and any environment
//! the build tool needs for that architecture only. Adding a target is
//! adding an entry here; the executor never branches on architecture.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::abi::Arch;
use crate::error::{Result, TargetError};

/// Minimum Android API level the artifacts target.
///
/// Baked into the NDK compiler wrapper names (`aarch64-linux-android21-clang`).
pub const MIN_API_LEVEL: u32 = 21;

/// One architecture/ABI combination to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildTarget {
    /// CPU architecture.
    pub arch: Arch,
    /// ABI name, also the output subdirectory (e.g. `arm64-v8a`).
    pub abi: String,
    /// C compiler wrapper name inside the toolchain `bin/` directory.
    pub compiler: String,
    /// C++ driver wrapper name, used for the external link step.
    pub linker: String,
    /// Environment set only for this target (e.g. `GOARM=7`).
    #[serde(default)]
    pub env_overrides: BTreeMap<String, String>,
}

impl BuildTarget {
    /// Build a target whose compiler names follow the NDK wrapper convention
    /// `{triple}{api}-clang` / `{triple}{api}-clang++`.
    pub fn new(arch: Arch, abi: impl Into<String>, api_level: u32) -> Self {
        let prefix = format!("{}{api_level}", arch.clang_triple());
        Self {
            arch,
            abi: abi.into(),
            compiler: format!("{prefix}-clang"),
            linker: format!("{prefix}-clang++"),
            env_overrides: BTreeMap::new(),
        }
    }

    /// Add an environment override for this target.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }

    /// Identifier used in status lines and reports.
    pub fn id(&self) -> &str {
        &self.abi
    }
}

/// An ordered, immutable set of build targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "target")]
    targets: Vec<BuildTarget>,
}

impl Catalog {
    /// Build a catalog from explicit entries, rejecting duplicate ABIs.
    pub fn new(targets: Vec<BuildTarget>) -> Result<Self> {
        for (i, t) in targets.iter().enumerate() {
            if targets[..i].iter().any(|prev| prev.abi == t.abi) {
                return Err(TargetError::Validation {
                    detail: format!("duplicate target ABI '{}'", t.abi),
                });
            }
        }
        Ok(Self { targets })
    }

    /// Targets in catalog order.
    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Find a target by ABI name (`arm64-v8a`) or architecture name (`arm64`).
    pub fn find(&self, name: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.abi == name).or_else(|| {
            let arch: Arch = name.parse().ok()?;
            self.targets.iter().find(|t| t.arch == arch)
        })
    }

    /// Restrict to the named targets, keeping catalog order.
    ///
    /// An empty `names` keeps every target.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Catalog> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        let mut wanted = Vec::new();
        for name in names {
            let target = self.find(name.as_ref()).ok_or_else(|| TargetError::UnknownTarget {
                name: name.as_ref().to_string(),
            })?;
            wanted.push(target.abi.clone());
        }
        let targets = self
            .targets
            .iter()
            .filter(|t| wanted.contains(&t.abi))
            .cloned()
            .collect();
        Ok(Catalog { targets })
    }
}

/// The four Android ABIs, in the order artifacts are built and reported.
pub fn default_catalog() -> Catalog {
    Catalog {
        targets: vec![
            BuildTarget::new(Arch::Arm64, "arm64-v8a", MIN_API_LEVEL),
            BuildTarget::new(Arch::Arm, "armeabi-v7a", MIN_API_LEVEL).with_env("GOARM", "7"),
            BuildTarget::new(Arch::X86, "x86", MIN_API_LEVEL),
            BuildTarget::new(Arch::X86_64, "x86_64", MIN_API_LEVEL),
        ],
    }
}
