//! `abiforge clean`: remove build artifacts.

use std::fs;
use std::path::{Component, Path};

use anyhow::{bail, Context, Result};

use crate::manifest::{resolve_out_dir, AbiforgeManifest};

/// Remove the output directory of the project.
pub fn run(project_dir: &Path, manifest: Option<&AbiforgeManifest>) -> Result<()> {
    let out_dir = resolve_out_dir(project_dir, manifest);
    ensure_inside_project(project_dir, &out_dir)?;
    if out_dir.exists() {
        fs::remove_dir_all(&out_dir)
            .with_context(|| format!("removing {}", out_dir.display()))?;
        println!("Removed {}", out_dir.display());
    } else {
        println!("Already clean: {} does not exist", out_dir.display());
    }
    Ok(())
}

/// The output directory must be a strict subdirectory of the project.
fn ensure_inside_project(project_dir: &Path, out_dir: &Path) -> Result<()> {
    let Ok(relative) = out_dir.strip_prefix(project_dir) else {
        bail!(
            "refusing to remove {}: outside the project directory {}",
            out_dir.display(),
            project_dir.display()
        );
    };
    let below_project = relative.components().all(|c| matches!(c, Component::Normal(_)))
        && relative.components().next().is_some();
    if !below_project {
        bail!(
            "refusing to remove {}: out-dir must name a subdirectory of the project",
            out_dir.display()
        );
    }
    if out_dir.exists() {
        let project = project_dir
            .canonicalize()
            .with_context(|| format!("resolving {}", project_dir.display()))?;
        let out = out_dir
            .canonicalize()
            .with_context(|| format!("resolving {}", out_dir.display()))?;
        if out == project || !out.starts_with(&project) {
            bail!(
                "refusing to remove {}: resolves outside the project directory",
                out_dir.display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_out_dir(out_dir: &str) -> AbiforgeManifest {
        toml::from_str(&format!(
            "[project]\nname = \"x\"\n[build]\nout-dir = \"{out_dir}\"\n"
        ))
        .unwrap()
    }

    #[test]
    fn clean_refuses_project_or_outside_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("proj");
        let source = project.join("cmd/core/main.go");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "package main\n").unwrap();

        for out_dir in ["", ".", "out/..", "..", "../other", "/tmp"] {
            let err = run(&project, Some(&manifest_with_out_dir(out_dir))).unwrap_err();
            assert!(err.to_string().contains("refusing"), "{out_dir:?}: {err}");
        }
        assert!(source.is_file());
        assert!(dir.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn clean_refuses_symlink_to_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("out")).unwrap();

        assert!(run(dir.path(), None).is_err());
        assert!(dir.path().join("main.go").is_file());
    }

    #[test]
    fn clean_removes_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out/arm64-v8a");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("libcore.so"), b"data").unwrap();

        run(dir.path(), None).unwrap();
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn clean_handles_already_clean() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), None).unwrap();
    }

    #[test]
    fn clean_uses_manifest_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let jni = dir.path().join("out/jniLibs");
        fs::create_dir_all(&jni).unwrap();
        let manifest: AbiforgeManifest =
            toml::from_str("[project]\nname = \"x\"\n[build]\nout-dir = \"out/jniLibs\"\n")
                .unwrap();

        run(dir.path(), Some(&manifest)).unwrap();
        assert!(!jni.exists());
        assert!(dir.path().join("out").exists());
    }
}
