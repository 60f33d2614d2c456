//! `abiforge init`: project scaffolding.

use std::fs;
use std::path::Path;

use abiforge_targets::default_catalog;
use abiforge_targets::parse::catalog_to_toml;
use anyhow::{bail, Context, Result};

use crate::manifest::{AbiforgeManifest, MANIFEST_FILE};

/// Create a new project directory `name` relative to cwd.
pub fn run(name: &str) -> Result<()> {
    create_project(Path::new(name), name)
}

pub(crate) fn create_project(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }
    fs::create_dir_all(project_dir)
        .with_context(|| format!("creating {}", project_dir.display()))?;

    fs::write(project_dir.join(MANIFEST_FILE), AbiforgeManifest::template(name))
        .context("writing abiforge.toml")?;

    // Starting point for a custom catalog; unused until `[build] catalog` names it.
    let catalog = catalog_to_toml(&default_catalog()).context("serializing target catalog")?;
    fs::write(project_dir.join("targets.toml"), catalog).context("writing targets.toml")?;

    fs::write(project_dir.join(".gitignore"), "out/\n").context("writing .gitignore")?;

    println!("Created project '{name}'");
    println!("  {name}/{MANIFEST_FILE}");
    println!("  {name}/targets.toml");
    println!("  {name}/.gitignore");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use abiforge_targets::parse::load_catalog_toml;

    #[test]
    fn init_creates_project_structure() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("demo");

        create_project(&project_path, "demo").unwrap();

        assert!(project_path.join("abiforge.toml").is_file());
        assert!(project_path.join("targets.toml").is_file());
        assert!(project_path.join(".gitignore").is_file());
    }

    #[test]
    fn init_generates_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("valid-manifest");

        create_project(&project_path, "valid-manifest").unwrap();

        let content = fs::read_to_string(project_path.join("abiforge.toml")).unwrap();
        let manifest = AbiforgeManifest::from_str(&content).unwrap();
        assert_eq!(manifest.project.name, "valid-manifest");
    }

    #[test]
    fn init_catalog_matches_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("cat");

        create_project(&project_path, "cat").unwrap();

        let catalog = load_catalog_toml(&project_path.join("targets.toml")).unwrap();
        assert_eq!(catalog, default_catalog());
    }

    #[test]
    fn init_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("existing");
        fs::create_dir(&project_path).unwrap();

        let err = create_project(&project_path, "existing").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
