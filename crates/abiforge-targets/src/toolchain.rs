//! NDK toolchain discovery.
//!
//! The NDK lays its LLVM toolchain out as
//! `<root>/toolchains/llvm/prebuilt/<host-variant>/bin`. Discovery takes the
//! externally supplied root, probes the host variants known for the running
//! host in order, and returns the first `bin/` directory that exists and is
//! non-empty. Nothing here is retried: a missing toolchain is a setup error.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::error::{Result, TargetError};
use crate::host::{HostDescriptor, HostOs};

/// Environment variables consulted for the NDK root, in priority order.
pub const NDK_ROOT_VARS: [&str; 3] = ["ANDROID_NDK_HOME", "ANDROID_NDK_ROOT", "NDK_HOME"];

const PREBUILT_DIR: &str = "toolchains/llvm/prebuilt";

/// A resolved NDK toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainPath {
    /// NDK root directory as supplied.
    pub root: PathBuf,
    /// Prebuilt variant that matched, e.g. `linux-x86_64`.
    pub host_variant: String,
    /// `<root>/toolchains/llvm/prebuilt/<variant>/bin`.
    pub bin_dir: PathBuf,
    /// `Pkg.Revision` from `source.properties`, when present and parseable.
    pub revision: Option<semver::Version>,
    host_os: HostOs,
}

impl ToolchainPath {
    /// Path to a clang wrapper script (`.cmd` on Windows hosts).
    pub fn wrapper(&self, name: &str) -> PathBuf {
        let suffix = match self.host_os {
            HostOs::Windows => ".cmd",
            _ => "",
        };
        self.bin_dir.join(format!("{name}{suffix}"))
    }

    /// Path to a native LLVM tool binary such as `llvm-readelf`.
    pub fn llvm_tool(&self, name: &str) -> PathBuf {
        let suffix = match self.host_os {
            HostOs::Windows => ".exe",
            _ => "",
        };
        self.bin_dir.join(format!("{name}{suffix}"))
    }
}

/// Resolve the NDK root from the process environment.
///
/// Empty values count as unset.
pub fn toolchain_root_from_env() -> Option<PathBuf> {
    toolchain_root_from(|key| std::env::var(key).ok())
}

/// Resolve the NDK root through an arbitrary variable lookup.
pub fn toolchain_root_from<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    NDK_ROOT_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Locate the host toolchain under `root`.
///
/// Fails with [`TargetError::MissingConfiguration`] when `root` is absent or
/// empty, and with [`TargetError::UnsupportedHost`] when no known prebuilt
/// layout for `host` exists under it.
pub fn locate(root: Option<&Path>, host: &HostDescriptor) -> Result<ToolchainPath> {
    let root = match root {
        Some(r) if !r.as_os_str().is_empty() => r,
        _ => {
            return Err(TargetError::MissingConfiguration {
                what: "toolchain root".into(),
            })
        }
    };

    let candidates = host.prebuilt_candidates();
    if candidates.is_empty() {
        return Err(TargetError::UnsupportedHost {
            host: host.to_string(),
            detail: "no prebuilt NDK toolchain exists for this host".into(),
        });
    }

    let prebuilt = root.join(PREBUILT_DIR);
    let mut empty: Option<PathBuf> = None;
    for variant in &candidates {
        let bin_dir = prebuilt.join(variant).join("bin");
        debug!("probing {}", bin_dir.display());
        if !bin_dir.is_dir() {
            continue;
        }
        if !dir_has_entries(&bin_dir)? {
            debug!("{} is empty, trying next layout", bin_dir.display());
            empty.get_or_insert(bin_dir);
            continue;
        }
        let revision = read_revision(root);
        debug!(
            "toolchain resolved: {} (revision {})",
            bin_dir.display(),
            revision
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown".into())
        );
        return Ok(ToolchainPath {
            root: root.to_path_buf(),
            host_variant: (*variant).to_string(),
            bin_dir,
            revision,
            host_os: host.os,
        });
    }

    if let Some(bin_dir) = empty {
        return Err(TargetError::UnsupportedHost {
            host: host.to_string(),
            detail: format!("toolchain directory {} is empty", bin_dir.display()),
        });
    }
    Err(TargetError::UnsupportedHost {
        host: host.to_string(),
        detail: format!(
            "none of [{}] found under {}",
            candidates.join(", "),
            prebuilt.display()
        ),
    })
}

fn dir_has_entries(dir: &Path) -> Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_some())
}

/// Parse `Pkg.Revision` out of `<root>/source.properties`.
fn read_revision(root: &Path) -> Option<semver::Version> {
    let content = fs::read_to_string(root.join("source.properties")).ok()?;
    parse_revision(&content)
}

pub(crate) fn parse_revision(properties: &str) -> Option<semver::Version> {
    properties
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "Pkg.Revision")
        .and_then(|(_, value)| semver::Version::parse(value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_ndk(variant: &str, with_tool: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join(PREBUILT_DIR).join(variant).join("bin");
        fs::create_dir_all(&bin).unwrap();
        if with_tool {
            fs::write(bin.join("aarch64-linux-android21-clang"), b"#!/bin/sh\n").unwrap();
        }
        dir
    }

    fn linux() -> HostDescriptor {
        HostDescriptor::new(HostOs::Linux, "x86_64")
    }

    #[test]
    fn missing_root_is_configuration_error() {
        let err = locate(None, &linux()).unwrap_err();
        assert!(matches!(err, TargetError::MissingConfiguration { .. }));

        let err = locate(Some(Path::new("")), &linux()).unwrap_err();
        assert!(matches!(err, TargetError::MissingConfiguration { .. }));
    }

    #[test]
    fn locates_linux_toolchain() {
        let ndk = fake_ndk("linux-x86_64", true);
        let tc = locate(Some(ndk.path()), &linux()).unwrap();
        assert_eq!(tc.host_variant, "linux-x86_64");
        assert!(tc.bin_dir.ends_with("prebuilt/linux-x86_64/bin"));
        assert_eq!(
            tc.wrapper("aarch64-linux-android21-clang"),
            tc.bin_dir.join("aarch64-linux-android21-clang")
        );
    }

    #[test]
    fn locate_is_idempotent() {
        let ndk = fake_ndk("linux-x86_64", true);
        let first = locate(Some(ndk.path()), &linux()).unwrap();
        let second = locate(Some(ndk.path()), &linux()).unwrap();
        assert_eq!(first.bin_dir, second.bin_dir);
        assert_eq!(first, second);
    }

    #[test]
    fn unrecognized_layout_is_unsupported_host() {
        let ndk = fake_ndk("darwin-x86_64", true);
        let err = locate(Some(ndk.path()), &linux()).unwrap_err();
        assert!(matches!(err, TargetError::UnsupportedHost { .. }));
        assert!(err.to_string().contains("linux-x86_64"));
    }

    #[test]
    fn unknown_os_is_unsupported_host() {
        let ndk = fake_ndk("linux-x86_64", true);
        let host = HostDescriptor::new(HostOs::Other, "riscv64");
        let err = locate(Some(ndk.path()), &host).unwrap_err();
        assert!(matches!(err, TargetError::UnsupportedHost { .. }));
    }

    #[test]
    fn empty_bin_dir_is_rejected() {
        let ndk = fake_ndk("linux-x86_64", false);
        let err = locate(Some(ndk.path()), &linux()).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn macos_falls_back_to_arm64_variant() {
        let ndk = fake_ndk("darwin-arm64", true);
        let host = HostDescriptor::new(HostOs::MacOs, "aarch64");
        let tc = locate(Some(ndk.path()), &host).unwrap();
        assert_eq!(tc.host_variant, "darwin-arm64");
    }

    #[test]
    fn empty_variant_skipped_for_next_candidate() {
        let ndk = fake_ndk("darwin-arm64", true);
        fs::create_dir_all(ndk.path().join(PREBUILT_DIR).join("darwin-x86_64/bin")).unwrap();
        let host = HostDescriptor::new(HostOs::MacOs, "aarch64");
        let tc = locate(Some(ndk.path()), &host).unwrap();
        assert_eq!(tc.host_variant, "darwin-arm64");
    }

    #[test]
    fn windows_wrappers_and_tools() {
        let ndk = fake_ndk("windows-x86_64", true);
        let host = HostDescriptor::new(HostOs::Windows, "x86_64");
        let tc = locate(Some(ndk.path()), &host).unwrap();
        assert!(tc.wrapper("x86_64-linux-android21-clang").ends_with("x86_64-linux-android21-clang.cmd"));
        assert!(tc.llvm_tool("llvm-readelf").ends_with("llvm-readelf.exe"));
    }

    #[test]
    fn reads_source_properties_revision() {
        let ndk = fake_ndk("linux-x86_64", true);
        fs::write(
            ndk.path().join("source.properties"),
            "Pkg.Desc = Android NDK\nPkg.Revision = 26.1.10909125\n",
        )
        .unwrap();
        let tc = locate(Some(ndk.path()), &linux()).unwrap();
        assert_eq!(tc.revision, Some(semver::Version::new(26, 1, 10909125)));
    }

    #[test]
    fn parse_revision_with_prerelease() {
        let v = parse_revision("Pkg.Revision = 27.0.11718014-beta1").unwrap();
        assert_eq!(v.major, 27);
        assert!(parse_revision("Pkg.Desc = nothing").is_none());
    }

    #[test]
    fn root_from_lookup_skips_empty_values() {
        let root = toolchain_root_from(|key| match key {
            "ANDROID_NDK_HOME" => Some("  ".into()),
            "NDK_HOME" => Some("/opt/ndk".into()),
            _ => None,
        });
        assert_eq!(root, Some(PathBuf::from("/opt/ndk")));

        assert_eq!(toolchain_root_from(|_| None), None);
    }

    #[test]
    fn root_from_lookup_prefers_ndk_home() {
        let root = toolchain_root_from(|key| Some(format!("/ndk/{key}")));
        assert_eq!(root, Some(PathBuf::from("/ndk/ANDROID_NDK_HOME")));
    }
}
