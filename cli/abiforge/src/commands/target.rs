//! `abiforge target`: catalog listing, description, and validation.

use std::path::Path;

use abiforge_targets::parse::{
    catalog_to_json, catalog_to_toml, load_catalog_toml, validate_catalog,
};
use abiforge_targets::{default_catalog, Catalog};
use anyhow::{bail, Context, Result};
use log::warn;

use crate::manifest::AbiforgeManifest;

/// Load and validate a custom catalog. Validation errors are fatal,
/// warnings are logged.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let catalog =
        load_catalog_toml(path).with_context(|| format!("loading {}", path.display()))?;
    if let Err(issues) = validate_catalog(&catalog) {
        let mut errors = 0;
        for issue in &issues {
            if issue.severity == "error" {
                errors += 1;
                eprintln!("error: {}: {}", path.display(), issue.message);
            } else {
                warn!("{}: {}", path.display(), issue.message);
            }
        }
        if errors > 0 {
            bail!("{} has {errors} invalid target definition(s)", path.display());
        }
    }
    Ok(catalog)
}

/// The project's catalog: the manifest's custom catalog, or the built-in one.
pub fn project_catalog(
    project_dir: &Path,
    manifest: Option<&AbiforgeManifest>,
) -> Result<Catalog> {
    match manifest.and_then(|m| m.build.catalog.as_ref()) {
        Some(path) => load_catalog(&project_dir.join(path)),
        None => Ok(default_catalog()),
    }
}

/// List every target in the catalog.
pub fn list(catalog: &Catalog) -> Result<()> {
    println!("Targets:");
    println!();
    for target in catalog.targets() {
        let overrides: Vec<String> = target
            .env_overrides
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!(
            "  {:<14} {:<6} {:<40} {}",
            target.abi,
            target.arch.goarch(),
            target.compiler,
            overrides.join(" ")
        );
    }
    println!();
    println!("Use 'abiforge target describe <name>' for details.");
    Ok(())
}

/// Describe one target. `format` is `toml`, `json`, or human-readable.
pub fn describe(catalog: &Catalog, name: &str, format: Option<&str>) -> Result<()> {
    let Some(target) = catalog.find(name) else {
        bail!("unknown target: '{name}'. Use 'abiforge target list' to see available targets.");
    };
    let single = Catalog::new(vec![target.clone()])?;

    match format {
        Some("toml") => {
            print!("{}", catalog_to_toml(&single)?);
        }
        Some("json") => {
            println!("{}", catalog_to_json(&single));
        }
        Some(other) => bail!("unknown format '{other}' (expected toml or json)"),
        None => {
            println!("=== Target: {} ===", target.abi);
            println!();
            println!("--- Architecture ---");
            println!("  Name:        {}", target.arch.goarch());
            println!("  Triple:      {}", target.arch.clang_triple());
            println!("  Word size:   {} bits", target.arch.word_size());
            println!("  ELF machine: {}", target.arch.elf_machine());
            println!();
            println!("--- Toolchain ---");
            println!("  Compiler: {}", target.compiler);
            println!("  Linker:   {}", target.linker);
            println!();
            println!("--- Environment ---");
            println!("  GOOS=android GOARCH={} CGO_ENABLED=1", target.arch.goarch());
            for (key, value) in &target.env_overrides {
                println!("  {key}={value}");
            }
        }
    }
    Ok(())
}

/// Validate a catalog file and report every issue.
pub fn validate(path: &Path) -> Result<()> {
    let catalog =
        load_catalog_toml(path).with_context(|| format!("loading {}", path.display()))?;
    match validate_catalog(&catalog) {
        Ok(()) => {
            println!("{}: {} target(s), valid", path.display(), catalog.len());
            Ok(())
        }
        Err(issues) => {
            for issue in &issues {
                println!("  {}: {}", issue.severity, issue.message);
            }
            if issues.iter().any(|i| i.severity == "error") {
                bail!("{} is invalid", path.display());
            }
            println!("{}: {} target(s), valid with warnings", path.display(), catalog.len());
            Ok(())
        }
    }
}
