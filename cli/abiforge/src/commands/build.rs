//! `abiforge build`: build every target ABI and verify the artifacts.

use std::path::{Path, PathBuf};

use abiforge_build::{
    run_pipeline, BuildJob, DependencyInspector, ExecutionMode, Invoker, PipelineConfig,
    ProcessInvoker,
};
use abiforge_targets::toolchain::toolchain_root_from_env;
use abiforge_targets::{default_catalog, Catalog, HostDescriptor};
use anyhow::{Context, Result};
use clap::Args;
use log::info;

use crate::commands::target::load_catalog;
use crate::manifest::{resolve_out_dir, AbiforgeManifest};

/// Build tool used when neither flag nor manifest names one.
const DEFAULT_TOOL: &str = "go";

/// Flags for `abiforge build`. Each overrides the matching manifest value.
#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Build only these targets (ABI or arch name); repeatable
    #[arg(long = "target")]
    pub targets: Vec<String>,
    /// Comma-separated build tags (default: android)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// NDK root (default: ANDROID_NDK_HOME / ANDROID_NDK_ROOT / NDK_HOME)
    #[arg(long)]
    pub ndk_home: Option<PathBuf>,
    /// Output directory; artifacts land in <out-dir>/<abi>/
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
    /// Build entry point passed to the build tool
    #[arg(long)]
    pub entry: Option<String>,
    /// Custom target catalog TOML
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Build up to N targets at once (fail-fast)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,
    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
    /// Fail when verification reports any warning
    #[arg(long)]
    pub strict_verify: bool,
    /// Skip artifact verification
    #[arg(long)]
    pub no_verify: bool,
}

/// Run the build with the real build tool on the current host.
pub fn run(
    project_dir: &Path,
    manifest: Option<&AbiforgeManifest>,
    args: &BuildArgs,
) -> Result<()> {
    build(
        project_dir,
        manifest,
        args,
        HostDescriptor::current(),
        &ProcessInvoker,
        None,
    )
}

pub(crate) fn build(
    project_dir: &Path,
    manifest: Option<&AbiforgeManifest>,
    args: &BuildArgs,
    host: HostDescriptor,
    invoker: &dyn Invoker,
    inspector: Option<Box<dyn DependencyInspector>>,
) -> Result<()> {
    let config = resolve_config(project_dir, manifest, args, host)?;
    let output = run_pipeline(config, invoker, inspector)?;
    let summary = output.summary();

    if args.json {
        println!("{}", summary.to_json());
    } else {
        println!(
            "Toolchain: {} ({})",
            output.toolchain.bin_dir.display(),
            output.toolchain.host_variant
        );
        println!();
        print!("{summary}");
    }
    info!("build finished in {} ms", output.duration_ms);

    output.ensure_success()?;
    Ok(())
}

/// Merge flags, manifest, and environment into a pipeline configuration.
pub(crate) fn resolve_config(
    project_dir: &Path,
    manifest: Option<&AbiforgeManifest>,
    args: &BuildArgs,
    host: HostDescriptor,
) -> Result<PipelineConfig> {
    let toolchain_root = args
        .ndk_home
        .clone()
        .or_else(|| manifest.and_then(|m| m.toolchain.ndk_home.clone()))
        .or_else(toolchain_root_from_env);

    let catalog_path = args
        .catalog
        .clone()
        .or_else(|| manifest.and_then(|m| m.build.catalog.clone()))
        .map(|p| project_dir.join(p));
    let catalog = match catalog_path {
        Some(path) => load_catalog(&path)?,
        None => default_catalog(),
    };
    let catalog = select_targets(&catalog, args, manifest)?;

    let tags = if args.tags.is_empty() {
        manifest.map(|m| m.build.tags.clone()).unwrap_or_default()
    } else {
        args.tags.clone()
    };

    let out_dir = match &args.out_dir {
        Some(dir) => project_dir.join(dir),
        None => resolve_out_dir(project_dir, manifest),
    };
    let job = BuildJob {
        tool: PathBuf::from(
            manifest
                .and_then(|m| m.build.tool.clone())
                .unwrap_or_else(|| DEFAULT_TOOL.to_string()),
        ),
        entry: args
            .entry
            .clone()
            .or_else(|| manifest.and_then(|m| m.module.entry.clone()))
            .unwrap_or_else(|| ".".to_string()),
        out_dir,
        artifact_name: artifact_name(project_dir, manifest),
        work_dir: Some(project_dir.to_path_buf()),
    };

    let jobs = args.jobs.or_else(|| manifest.and_then(|m| m.build.jobs));
    let mode = match jobs {
        Some(n) if n > 1 => ExecutionMode::Parallel { jobs: n },
        _ => ExecutionMode::Sequential,
    };

    let verify_config = manifest.map(|m| m.verify.clone()).unwrap_or_default();

    Ok(PipelineConfig {
        toolchain_root,
        host,
        catalog,
        tags,
        job,
        mode,
        verify: verify_config.enabled && !args.no_verify,
        strict_verify: verify_config.strict || args.strict_verify,
    })
}

fn select_targets(
    catalog: &Catalog,
    args: &BuildArgs,
    manifest: Option<&AbiforgeManifest>,
) -> Result<Catalog> {
    let names = if args.targets.is_empty() {
        manifest.map(|m| m.build.targets.clone()).unwrap_or_default()
    } else {
        args.targets.clone()
    };
    catalog
        .select(names.as_slice())
        .context("resolving targets (see `abiforge target list`)")
}

fn artifact_name(project_dir: &Path, manifest: Option<&AbiforgeManifest>) -> String {
    match manifest {
        Some(m) => m.artifact_name(),
        None => {
            let stem = project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_string());
            format!("lib{stem}.so")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abiforge_targets::HostOs;

    fn host() -> HostDescriptor {
        HostDescriptor::new(HostOs::Linux, "x86_64")
    }

    fn manifest(extra: &str) -> AbiforgeManifest {
        toml::from_str(&format!("[project]\nname = \"core\"\n{extra}")).unwrap()
    }

    #[test]
    fn defaults_without_manifest() {
        let args = BuildArgs {
            ndk_home: Some(PathBuf::from("/ndk")),
            ..Default::default()
        };
        let config = resolve_config(Path::new("/work/app"), None, &args, host()).unwrap();
        assert_eq!(config.toolchain_root, Some(PathBuf::from("/ndk")));
        assert_eq!(config.catalog.len(), 4);
        assert!(config.tags.is_empty());
        assert_eq!(config.job.tool, PathBuf::from("go"));
        assert_eq!(config.job.entry, ".");
        assert_eq!(config.job.artifact_name, "libapp.so");
        assert_eq!(config.job.out_dir, PathBuf::from("/work/app/out"));
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert!(config.verify);
        assert!(!config.strict_verify);
    }

    #[test]
    fn manifest_values_apply() {
        let m = manifest(
            r#"
[module]
entry = "./cmd/core"
[build]
tool = "/usr/local/go/bin/go"
tags = ["android", "netgo"]
out-dir = "jni"
targets = ["x86_64", "arm64-v8a"]
jobs = 3
[toolchain]
ndk-home = "/opt/ndk"
[verify]
strict = true
"#,
        );
        let config = resolve_config(Path::new("/p"), Some(&m), &BuildArgs::default(), host())
            .unwrap();
        assert_eq!(config.toolchain_root, Some(PathBuf::from("/opt/ndk")));
        assert_eq!(config.tags, vec!["android", "netgo"]);
        assert_eq!(config.job.entry, "./cmd/core");
        assert_eq!(config.job.artifact_name, "libcore.so");
        assert_eq!(config.job.out_dir, PathBuf::from("/p/jni"));
        let abis: Vec<_> = config.catalog.targets().iter().map(|t| t.abi.as_str()).collect();
        assert_eq!(abis, vec!["arm64-v8a", "x86_64"]);
        assert_eq!(config.mode, ExecutionMode::Parallel { jobs: 3 });
        assert!(config.strict_verify);
    }

    #[test]
    fn flags_override_manifest() {
        let m = manifest(
            r#"
[build]
tags = ["android"]
targets = ["x86"]
[toolchain]
ndk-home = "/opt/ndk"
"#,
        );
        let args = BuildArgs {
            targets: vec!["arm".into()],
            tags: vec!["netgo".into()],
            ndk_home: Some(PathBuf::from("/flag/ndk")),
            entry: Some("./cmd/other".into()),
            jobs: Some(1),
            no_verify: true,
            ..Default::default()
        };
        let config = resolve_config(Path::new("/p"), Some(&m), &args, host()).unwrap();
        assert_eq!(config.toolchain_root, Some(PathBuf::from("/flag/ndk")));
        assert_eq!(config.tags, vec!["netgo"]);
        assert_eq!(config.job.entry, "./cmd/other");
        assert_eq!(config.catalog.targets()[0].abi, "armeabi-v7a");
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert!(!config.verify);
    }

    #[test]
    fn unknown_target_is_error() {
        let args = BuildArgs {
            targets: vec!["mips".into()],
            ..Default::default()
        };
        let err = resolve_config(Path::new("/p"), None, &args, host()).unwrap_err();
        assert!(format!("{err:#}").contains("mips"));
    }
}
