//! abiforge CLI: build a native module for every Android ABI.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use commands::build::BuildArgs;
use manifest::AbiforgeManifest;

#[derive(Parser)]
#[command(
    name = "abiforge",
    version,
    about = "Multi-ABI Android cross-compilation orchestrator"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new abiforge project
    Init {
        /// Project name
        name: String,
    },
    /// Build the module for every target ABI, then verify the artifacts
    Build(BuildArgs),
    /// Verify existing artifacts
    Verify {
        /// Artifact files to check
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,
        /// Expected target (ABI or arch name)
        #[arg(long)]
        target: Option<String>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
        /// Exit with an error on any warning
        #[arg(long)]
        strict: bool,
    },
    /// Inspect the target catalog
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
    /// Check host, toolchain, and project status
    Doctor,
    /// Remove build artifacts
    Clean,
}

#[derive(Subcommand)]
enum TargetAction {
    /// List catalog targets
    List,
    /// Show details of a target
    Describe {
        /// ABI or architecture name
        name: String,
        /// Output format (default: human-readable, "toml" or "json")
        #[arg(long)]
        format: Option<String>,
    },
    /// Validate a custom catalog file
    Validate {
        /// Path to a targets.toml
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&name),

        Commands::Build(args) => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or(cwd);
            commands::build::run(&project_dir, manifest.as_ref(), &args)
        }

        Commands::Verify {
            artifacts,
            target,
            json,
            strict,
        } => {
            let (manifest, _) = load_manifest_optional(&cwd)?;
            let strict = strict || manifest.as_ref().is_some_and(|m| m.verify.strict);
            commands::verify::run(manifest.as_ref(), &artifacts, target.as_deref(), json, strict)
        }

        Commands::Target { action } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or_else(|| cwd.clone());
            let catalog = || commands::target::project_catalog(&project_dir, manifest.as_ref());
            match action {
                TargetAction::List => commands::target::list(&catalog()?),
                TargetAction::Describe { name, format } => {
                    commands::target::describe(&catalog()?, &name, format.as_deref())
                }
                TargetAction::Validate { path } => commands::target::validate(&cwd.join(path)),
            }
        }

        Commands::Doctor => commands::doctor::run(&cwd),

        Commands::Clean => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let project_dir = project_dir.unwrap_or(cwd);
            commands::clean::run(&project_dir, manifest.as_ref())
        }
    }
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(
    cwd: &Path,
) -> anyhow::Result<(Option<AbiforgeManifest>, Option<PathBuf>)> {
    match AbiforgeManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::sync::Mutex;

    use abiforge_build::{Invocation, InvocationOutcome, Invoker, NoInspector};
    use abiforge_targets::{HostDescriptor, HostOs};

    /// Little-endian ELF64 with one 16 KiB-aligned `PT_LOAD` segment.
    fn elf64(object_type: u16, machine: u16) -> Vec<u8> {
        let mut b = vec![0u8; 64 + 56];
        b[0..4].copy_from_slice(b"\x7fELF");
        b[4] = 2;
        b[5] = 1;
        b[6] = 1;
        b[16..18].copy_from_slice(&object_type.to_le_bytes());
        b[18..20].copy_from_slice(&machine.to_le_bytes());
        b[32..40].copy_from_slice(&64u64.to_le_bytes());
        b[54..56].copy_from_slice(&56u16.to_le_bytes());
        b[56..58].copy_from_slice(&1u16.to_le_bytes());
        b[64..68].copy_from_slice(&1u32.to_le_bytes());
        b[112..120].copy_from_slice(&0x4000u64.to_le_bytes());
        b
    }

    /// Stands in for the build tool: writes a PIE for the requested arch.
    struct FakeGo {
        calls: Mutex<Vec<String>>,
        fail: Option<&'static str>,
        object_type: u16,
    }

    impl FakeGo {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: None,
                object_type: 3,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Invoker for FakeGo {
        fn invoke(&self, invocation: &Invocation) -> io::Result<InvocationOutcome> {
            self.calls.lock().unwrap().push(invocation.target.clone());
            if self.fail == Some(invocation.target.as_str()) {
                return Ok(InvocationOutcome::failed(1, "cgo: C compiler not found"));
            }
            let machine = match invocation.env["GOARCH"].as_str() {
                "arm64" => 183,
                "arm" => 40,
                "386" => 3,
                _ => 62,
            };
            fs::write(&invocation.output, elf64(self.object_type, machine))?;
            Ok(InvocationOutcome::succeeded())
        }
    }

    fn fake_ndk(dir: &Path) -> PathBuf {
        let root = dir.join("ndk");
        let bin = root.join("toolchains/llvm/prebuilt/linux-x86_64/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("clang"), b"").unwrap();
        fs::write(root.join("source.properties"), "Pkg.Revision = 27.1.12297006\n").unwrap();
        root
    }

    fn linux() -> HostDescriptor {
        HostDescriptor::new(HostOs::Linux, "x86_64")
    }

    fn init_project(dir: &Path, name: &str) -> (PathBuf, AbiforgeManifest) {
        let project = dir.join(name);
        commands::init::create_project(&project, name).unwrap();
        let (manifest, found) = AbiforgeManifest::find_and_load(&project).unwrap().unwrap();
        assert_eq!(found, project);
        (project, manifest)
    }

    /// Full workflow: init → build → verify → clean.
    #[test]
    fn init_build_verify_clean_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = fake_ndk(dir.path());
        let (project, manifest) = init_project(dir.path(), "core");

        let args = BuildArgs {
            ndk_home: Some(ndk),
            ..Default::default()
        };
        let go = FakeGo::new();
        commands::build::build(
            &project,
            Some(&manifest),
            &args,
            linux(),
            &go,
            Some(Box::new(NoInspector)),
        )
        .unwrap();
        assert_eq!(go.calls(), vec!["arm64-v8a", "armeabi-v7a", "x86", "x86_64"]);

        let out = project.join("out/jniLibs");
        let artifacts: Vec<PathBuf> = ["arm64-v8a", "armeabi-v7a", "x86", "x86_64"]
            .iter()
            .map(|abi| out.join(abi).join("libcore.so"))
            .collect();
        for artifact in &artifacts {
            assert!(artifact.is_file(), "{} missing", artifact.display());
        }

        commands::verify::run(Some(&manifest), &artifacts, None, false, true).unwrap();

        commands::clean::run(&project, Some(&manifest)).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn build_failure_names_target_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = fake_ndk(dir.path());
        let (project, manifest) = init_project(dir.path(), "fails");

        let args = BuildArgs {
            ndk_home: Some(ndk),
            ..Default::default()
        };
        let go = FakeGo {
            fail: Some("armeabi-v7a"),
            ..FakeGo::new()
        };
        let err = commands::build::build(
            &project,
            Some(&manifest),
            &args,
            linux(),
            &go,
            Some(Box::new(NoInspector)),
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("armeabi-v7a"));
        assert_eq!(go.calls(), vec!["arm64-v8a", "armeabi-v7a"]);
        assert!(project.join("out/jniLibs/arm64-v8a/libfails.so").is_file());
        assert!(!project.join("out/jniLibs/x86").exists());
    }

    #[test]
    fn missing_toolchain_layout_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (project, manifest) = init_project(dir.path(), "nondk");

        let args = BuildArgs {
            ndk_home: Some(dir.path().join("no-such-ndk")),
            ..Default::default()
        };
        let go = FakeGo::new();
        let err = commands::build::build(
            &project,
            Some(&manifest),
            &args,
            linux(),
            &go,
            Some(Box::new(NoInspector)),
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("unsupported host"));
        assert!(go.calls().is_empty());
    }

    #[test]
    fn fixed_address_warns_unless_strict() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = fake_ndk(dir.path());
        let (project, manifest) = init_project(dir.path(), "static");

        let go = FakeGo {
            object_type: 2,
            ..FakeGo::new()
        };
        let args = BuildArgs {
            ndk_home: Some(ndk),
            targets: vec!["x86_64".into()],
            json: true,
            ..Default::default()
        };
        commands::build::build(
            &project,
            Some(&manifest),
            &args,
            linux(),
            &go,
            Some(Box::new(NoInspector)),
        )
        .unwrap();

        let strict = BuildArgs {
            strict_verify: true,
            ..args
        };
        let err = commands::build::build(
            &project,
            Some(&manifest),
            &strict,
            linux(),
            &go,
            Some(Box::new(NoInspector)),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("verification failed"));
    }

    #[test]
    fn parallel_build_keeps_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = fake_ndk(dir.path());
        let (project, manifest) = init_project(dir.path(), "par");

        let args = BuildArgs {
            ndk_home: Some(ndk),
            jobs: Some(4),
            ..Default::default()
        };
        let go = FakeGo::new();
        commands::build::build(
            &project,
            Some(&manifest),
            &args,
            linux(),
            &go,
            Some(Box::new(NoInspector)),
        )
        .unwrap();
        assert_eq!(go.calls().len(), 4);
    }

    #[test]
    fn target_commands_use_project_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let (project, _) = init_project(dir.path(), "cat");

        commands::target::validate(&project.join("targets.toml")).unwrap();
        let catalog = commands::target::load_catalog(&project.join("targets.toml")).unwrap();
        commands::target::list(&catalog).unwrap();
        commands::target::describe(&catalog, "x86_64", None).unwrap();
    }

    #[test]
    fn cli_parses_build_flags() {
        let cli = Cli::try_parse_from([
            "abiforge",
            "-vv",
            "build",
            "--target",
            "arm64-v8a",
            "--target",
            "x86",
            "--tags",
            "android,netgo",
            "--jobs",
            "2",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.targets, vec!["arm64-v8a", "x86"]);
                assert_eq!(args.tags, vec!["android", "netgo"]);
                assert_eq!(args.jobs, Some(2));
                assert!(args.json);
                assert!(!args.no_verify);
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn cli_verify_requires_artifacts() {
        assert!(Cli::try_parse_from(["abiforge", "verify"]).is_err());
    }
}
