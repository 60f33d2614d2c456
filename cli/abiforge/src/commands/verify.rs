//! `abiforge verify`: check existing artifacts without building.

use std::path::{Path, PathBuf};

use abiforge_build::{ArtifactVerifier, ReadelfInspector, VerificationReport, MIN_PAGE_SIZE};
use abiforge_targets::toolchain::toolchain_root_from_env;
use abiforge_targets::{default_catalog, locate, Arch, HostDescriptor};
use anyhow::{bail, Result};
use serde::Serialize;

use crate::manifest::AbiforgeManifest;

#[derive(Serialize)]
struct VerifyOutput<'a> {
    reports: &'a [VerificationReport],
    warnings: usize,
}

/// Verify each artifact. `target` names the expected ABI or arch; when
/// absent, an ABI directory name in the artifact path is used if present.
pub fn run(
    manifest: Option<&AbiforgeManifest>,
    artifacts: &[PathBuf],
    target: Option<&str>,
    json: bool,
    strict: bool,
) -> Result<()> {
    let verifier = ArtifactVerifier::new(MIN_PAGE_SIZE, Box::new(inspector(manifest)));
    let expected = match target {
        Some(name) => Some(resolve_arch(name)?),
        None => None,
    };

    let reports: Vec<VerificationReport> = artifacts
        .iter()
        .map(|path| verifier.verify_target(path, expected.or_else(|| arch_from_path(path))))
        .collect();
    let warnings: usize = reports.iter().map(|r| r.warnings.len()).sum();

    if json {
        let output = VerifyOutput {
            reports: &reports,
            warnings,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("=== Verification ===");
        for report in &reports {
            print!("{report}");
        }
        println!();
        println!("{} artifact(s), {warnings} warning(s)", reports.len());
    }

    if strict && warnings > 0 {
        bail!("verification failed: {warnings} warning(s)");
    }
    Ok(())
}

fn resolve_arch(name: &str) -> Result<Arch> {
    if let Some(target) = default_catalog().find(name) {
        return Ok(target.arch);
    }
    Ok(name.parse()?)
}

/// Infer the architecture from an `<abi>/<artifact>` path.
fn arch_from_path(path: &Path) -> Option<Arch> {
    let abi = path.parent()?.file_name()?.to_str()?;
    let catalog = default_catalog();
    catalog.targets().iter().find(|t| t.abi == abi).map(|t| t.arch)
}

/// Prefer the NDK's `llvm-readelf` when a toolchain can be located.
fn inspector(manifest: Option<&AbiforgeManifest>) -> ReadelfInspector {
    let root = manifest
        .and_then(|m| m.toolchain.ndk_home.clone())
        .or_else(toolchain_root_from_env);
    match locate(root.as_deref(), &HostDescriptor::current()) {
        Ok(toolchain) => ReadelfInspector::for_toolchain(&toolchain),
        Err(_) => ReadelfInspector::new("readelf"),
    }
}
