//! `abiforge doctor`: host and toolchain diagnostics.

use std::path::{Path, PathBuf};
use std::process::Command;

use abiforge_targets::toolchain::toolchain_root_from_env;
use abiforge_targets::{locate, Catalog, HostDescriptor, NDK_ROOT_VARS};
use anyhow::Result;

use crate::commands::target::project_catalog;
use crate::manifest::AbiforgeManifest;

/// Print diagnostic information. Never fails on a broken setup; every
/// problem is reported inline.
pub fn run(project_dir: &Path) -> Result<()> {
    let manifest = AbiforgeManifest::find_and_load(project_dir);
    let host = HostDescriptor::current();

    println!("=== abiforge doctor ===");
    println!();
    println!("abiforge version: {}", env!("CARGO_PKG_VERSION"));
    println!("Host:             {host}");
    println!(
        "Prebuilt layouts: {}",
        match host.prebuilt_candidates().as_slice() {
            [] => "(none known)".to_string(),
            names => names.join(", "),
        }
    );
    println!();

    println!("--- Project ---");
    let manifest = match manifest {
        Ok(Some((manifest, dir))) => {
            println!("  abiforge.toml: found at {}", dir.display());
            println!("  Project:       {}", manifest.project.name);
            Some(manifest)
        }
        Ok(None) => {
            println!("  abiforge.toml: not found");
            None
        }
        Err(e) => {
            println!("  abiforge.toml: error: {e:#}");
            None
        }
    };
    println!();

    println!("--- Toolchain ---");
    let (root, source) = toolchain_root(manifest.as_ref());
    match &root {
        Some(path) => println!("  Root:     {} (from {source})", path.display()),
        None => println!("  Root:     not set (export {})", NDK_ROOT_VARS[0]),
    }
    match locate(root.as_deref(), &host) {
        Ok(toolchain) => {
            println!("  Layout:   {}", toolchain.host_variant);
            println!("  Bin dir:  {}", toolchain.bin_dir.display());
            match &toolchain.revision {
                Some(rev) => println!("  Revision: {rev}"),
                None => println!("  Revision: unknown (no source.properties)"),
            }
            let readelf = toolchain.llvm_tool("llvm-readelf");
            println!(
                "  Inspector: {}",
                if readelf.is_file() {
                    readelf.display().to_string()
                } else {
                    "llvm-readelf missing, falling back to readelf".to_string()
                }
            );

            println!();
            println!("--- Targets ---");
            match project_catalog(project_dir, manifest.as_ref()) {
                Ok(catalog) => print_compilers(&catalog, |name| toolchain.wrapper(name).is_file()),
                Err(e) => println!("  catalog error: {e:#}"),
            }
        }
        Err(e) => println!("  Status:   {e}"),
    }
    println!();

    println!("--- Tools ---");
    let tool = manifest
        .as_ref()
        .and_then(|m| m.build.tool.clone())
        .unwrap_or_else(|| "go".to_string());
    print_tool_status(&tool, &["version"]);
    print_tool_status("readelf", &["--version"]);

    Ok(())
}

fn toolchain_root(manifest: Option<&AbiforgeManifest>) -> (Option<PathBuf>, &'static str) {
    if let Some(path) = manifest.and_then(|m| m.toolchain.ndk_home.clone()) {
        return (Some(path), "abiforge.toml");
    }
    match toolchain_root_from_env() {
        Some(path) => (Some(path), "environment"),
        None => (None, ""),
    }
}

fn print_compilers(catalog: &Catalog, present: impl Fn(&str) -> bool) {
    for target in catalog.targets() {
        let status = |name: &str| if present(name) { "ok" } else { "MISSING" };
        println!(
            "  {:<14} {} [{}], {} [{}]",
            target.abi,
            target.compiler,
            status(&target.compiler),
            target.linker,
            status(&target.linker)
        );
    }
}

fn print_tool_status(name: &str, args: &[&str]) {
    match Command::new(name).args(args).output() {
        Ok(output) => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first_line = version.lines().next().unwrap_or("(unknown version)");
            println!("  {name}: {first_line}");
        }
        Err(_) => {
            println!("  {name}: not found");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn doctor_runs_without_error() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path()).unwrap();
    }

    #[test]
    fn doctor_reports_broken_manifest_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abiforge.toml"), "not toml [[[").unwrap();
        run(dir.path()).unwrap();
    }

    #[test]
    fn doctor_continues_past_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("ndk/toolchains/llvm/prebuilt");
        for variant in HostDescriptor::current().prebuilt_candidates() {
            fs::create_dir_all(bin.join(variant).join("bin")).unwrap();
            fs::write(bin.join(variant).join("bin/clang"), b"").unwrap();
        }
        fs::write(
            dir.path().join("abiforge.toml"),
            format!(
                "[project]\nname = \"x\"\n[build]\ncatalog = \"missing.toml\"\n\
                 [toolchain]\nndk-home = \"{}\"\n",
                dir.path().join("ndk").display()
            ),
        )
        .unwrap();
        run(dir.path()).unwrap();
    }

    #[test]
    fn manifest_root_preferred() {
        let manifest: AbiforgeManifest =
            toml::from_str("[project]\nname = \"x\"\n[toolchain]\nndk-home = \"/opt/ndk\"\n")
                .unwrap();
        let (root, source) = toolchain_root(Some(&manifest));
        assert_eq!(root, Some(PathBuf::from("/opt/ndk")));
        assert_eq!(source, "abiforge.toml");
    }
}
