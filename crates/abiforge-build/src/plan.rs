//! Shared build plan composition.
//!
//! Every flag here guards against a load-time or launch-time crash on
//! Android, so none of it varies per target:
//! - stripped symbols and DWARF keep the artifact small
//! - PIE output is required by loaders that enforce ASLR on executables
//! - external linking hands the final link to the NDK clang driver
//! - 16 KiB maximum page size keeps segments loadable on 16 KiB kernels
//! - a static runtime support library avoids a missing `.so` at load time
//!
//! Target-specific variation belongs in [`abiforge_targets::BuildTarget`]
//! overrides, never here.

use std::fmt;

use serde::Serialize;

/// Minimum segment alignment the artifacts must carry, in bytes.
pub const MIN_PAGE_SIZE: u64 = 16 * 1024;

/// Linker flag that statically links the runtime support library.
pub const STATIC_RUNTIME_FLAG: &str = "-static-libgcc";

/// Feature tags used when the caller supplies none.
pub const DEFAULT_TAGS: [&str; 1] = ["android"];

/// Output binary kind requested from the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// Position-independent executable.
    Pie,
}

/// Who performs the final link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// The toolchain's own linker via the NDK clang driver.
    External,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Pie => f.write_str("pie"),
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMode::External => f.write_str("external"),
        }
    }
}

/// Flags shared by every target of a run. Never mutated after [`compose`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    /// Strip the symbol table and debug info.
    pub strip: bool,
    pub build_mode: BuildMode,
    pub link_mode: LinkMode,
    /// Required `max-page-size` passed to the external linker.
    pub max_page_size: u64,
    /// Link the runtime support library statically.
    pub static_runtime: bool,
    /// Build tags, deduplicated, in the order given.
    pub tags: Vec<String>,
    /// Remove host filesystem paths from the artifact.
    pub trim_paths: bool,
}

/// Compose the shared plan for a set of feature tags.
///
/// Blank tags are dropped and duplicates collapse to their first
/// occurrence. An empty set falls back to [`DEFAULT_TAGS`].
pub fn compose<S: AsRef<str>>(feature_tags: &[S]) -> BuildPlan {
    let mut tags: Vec<String> = Vec::new();
    for tag in feature_tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.is_empty() {
        tags = DEFAULT_TAGS.iter().map(|t| t.to_string()).collect();
    }

    BuildPlan {
        strip: true,
        build_mode: BuildMode::Pie,
        link_mode: LinkMode::External,
        max_page_size: MIN_PAGE_SIZE,
        static_runtime: true,
        tags,
        trim_paths: true,
    }
}

impl BuildPlan {
    /// Flags forwarded to the external linker.
    pub fn extldflags(&self) -> String {
        let mut flags = vec![format!("-Wl,-z,max-page-size={}", self.max_page_size)];
        if self.static_runtime {
            flags.push(STATIC_RUNTIME_FLAG.to_string());
        }
        flags.join(" ")
    }

    /// The build tool's `-ldflags` value.
    pub fn ldflags(&self) -> String {
        let mut flags = Vec::new();
        if self.strip {
            flags.push("-s".to_string());
            flags.push("-w".to_string());
        }
        flags.push(format!("-linkmode={}", self.link_mode));
        flags.push(format!("-extldflags '{}'", self.extldflags()));
        flags.join(" ")
    }

    /// Shared command-line flags, in a stable order.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.trim_paths {
            args.push("-trimpath".to_string());
        }
        args.push(format!("-buildmode={}", self.build_mode));
        args.push("-tags".to_string());
        args.push(self.tags.join(","));
        args.push("-ldflags".to_string());
        args.push(self.ldflags());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tags_when_empty() {
        let none: [&str; 0] = [];
        let plan = compose(&none);
        assert_eq!(plan.tags, vec!["android"]);
    }

    #[test]
    fn tags_deduplicated_in_order() {
        let plan = compose(&["android", " netgo ", "", "android", "with_gvisor"]);
        assert_eq!(plan.tags, vec!["android", "netgo", "with_gvisor"]);
    }

    #[test]
    fn fixed_policy() {
        let plan = compose(&["android"]);
        assert!(plan.strip);
        assert!(plan.static_runtime);
        assert!(plan.trim_paths);
        assert_eq!(plan.build_mode, BuildMode::Pie);
        assert_eq!(plan.link_mode, LinkMode::External);
        assert_eq!(plan.max_page_size, 16384);
    }

    #[test]
    fn ldflags_carry_page_size_and_runtime() {
        let plan = compose(&["android"]);
        assert_eq!(
            plan.ldflags(),
            "-s -w -linkmode=external -extldflags '-Wl,-z,max-page-size=16384 -static-libgcc'"
        );
    }

    #[test]
    fn args_are_stable() {
        let plan = compose(&["android", "netgo"]);
        assert_eq!(
            plan.args(),
            vec![
                "-trimpath".to_string(),
                "-buildmode=pie".to_string(),
                "-tags".to_string(),
                "android,netgo".to_string(),
                "-ldflags".to_string(),
                plan.ldflags(),
            ]
        );
    }

    #[test]
    fn compose_is_pure() {
        assert_eq!(compose(&["a", "b"]), compose(&["a", "b"]));
    }
}
