//! Fail-fast execution of a plan across the catalog.
//!
//! Targets run in catalog order. The first failure stops the run: no later
//! target is started, and the result list ends with the failed entry.
//! Artifacts left by an earlier run are removed before any target starts,
//! so after a failed run only this run's successful artifacts remain.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use abiforge_targets::{Arch, BuildTarget, Catalog, ToolchainPath};
use log::{info, warn};
use serde::Serialize;

use crate::error::{BuildError, Result};
use crate::invocation::{Invocation, Invoker};
use crate::plan::BuildPlan;

/// Module-specific inputs for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    /// Build tool executable (e.g. `go`).
    pub tool: PathBuf,
    /// Build entry point passed to the tool (package path or directory).
    pub entry: String,
    /// Root output directory; artifacts land in `<out_dir>/<abi>/`.
    pub out_dir: PathBuf,
    /// Artifact file name, identical for every ABI.
    pub artifact_name: String,
    /// Working directory for the build tool.
    pub work_dir: Option<PathBuf>,
}

impl BuildJob {
    /// Output path for one target.
    pub fn output_path(&self, target: &BuildTarget) -> PathBuf {
        self.out_dir.join(&target.abi).join(&self.artifact_name)
    }
}

/// How targets are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One target at a time, in catalog order.
    #[default]
    Sequential,
    /// Up to `jobs` targets at once. The first failure stops new targets
    /// from starting; targets already running finish.
    Parallel { jobs: usize },
}

/// Outcome of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    /// Target identifier (ABI name).
    pub target: String,
    pub arch: Arch,
    pub success: bool,
    /// Produced artifact, on success.
    pub artifact: Option<PathBuf>,
    pub exit_code: Option<i32>,
    /// Failure explanation (stderr tail or spawn error).
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// Results of one run, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRun {
    /// One entry per attempted target.
    pub results: Vec<BuildResult>,
    /// Targets never attempted because an earlier one failed.
    pub skipped: Vec<String>,
}

impl BuildRun {
    /// The first failed target, if any.
    pub fn first_failure(&self) -> Option<&BuildResult> {
        self.results.iter().find(|r| !r.success)
    }

    /// True when every target was attempted and succeeded.
    pub fn succeeded(&self) -> bool {
        self.skipped.is_empty() && self.results.iter().all(|r| r.success)
    }

    /// Successful results with their artifact paths.
    pub fn artifacts(&self) -> impl Iterator<Item = (&BuildResult, &Path)> {
        self.results
            .iter()
            .filter_map(|r| r.artifact.as_deref().map(|p| (r, p)))
    }

    /// Convert a failed run into [`BuildError::BuildFailure`].
    pub fn ensure_success(&self) -> Result<()> {
        match self.first_failure() {
            Some(failed) => Err(BuildError::BuildFailure {
                target: failed.target.clone(),
                exit_code: failed.exit_code,
                detail: failed
                    .detail
                    .clone()
                    .unwrap_or_else(|| "build tool failed".into()),
            }),
            None => Ok(()),
        }
    }
}

/// Bind the shared plan to one target.
///
/// Shared flags come from the plan verbatim; only the target's declared
/// overrides are added on top of the fixed cross-compilation variables.
pub fn bind(
    plan: &BuildPlan,
    target: &BuildTarget,
    toolchain: &ToolchainPath,
    job: &BuildJob,
) -> Invocation {
    let output = job.output_path(target);

    let mut env = BTreeMap::new();
    env.insert("GOOS".to_string(), "android".to_string());
    env.insert("GOARCH".to_string(), target.arch.goarch().to_string());
    env.insert("CGO_ENABLED".to_string(), "1".to_string());
    env.insert(
        "CC".to_string(),
        toolchain.wrapper(&target.compiler).display().to_string(),
    );
    env.insert(
        "CXX".to_string(),
        toolchain.wrapper(&target.linker).display().to_string(),
    );
    for (key, value) in &target.env_overrides {
        env.insert(key.clone(), value.clone());
    }

    let mut args = vec!["build".to_string()];
    args.extend(plan.args());
    args.push("-o".to_string());
    args.push(output.display().to_string());
    args.push(job.entry.clone());

    Invocation {
        target: target.abi.clone(),
        program: job.tool.clone(),
        args,
        env,
        current_dir: job.work_dir.clone(),
        output,
    }
}

/// Run every target of `catalog` with the given scheduling mode.
pub fn execute(
    plan: &BuildPlan,
    catalog: &Catalog,
    toolchain: &ToolchainPath,
    job: &BuildJob,
    invoker: &dyn Invoker,
    mode: ExecutionMode,
) -> BuildRun {
    for target in catalog.targets() {
        let path = job.output_path(target);
        if let Err(e) = remove_stale(&path) {
            warn!("cannot remove stale {}: {e}", path.display());
        }
    }
    match mode {
        ExecutionMode::Sequential => execute_sequential(plan, catalog, toolchain, job, invoker),
        ExecutionMode::Parallel { jobs } => {
            execute_parallel(plan, catalog, toolchain, job, invoker, jobs)
        }
    }
}

fn execute_sequential(
    plan: &BuildPlan,
    catalog: &Catalog,
    toolchain: &ToolchainPath,
    job: &BuildJob,
    invoker: &dyn Invoker,
) -> BuildRun {
    let targets = catalog.targets();
    let mut results = Vec::with_capacity(targets.len());
    for (i, target) in targets.iter().enumerate() {
        let result = build_one(plan, target, toolchain, job, invoker);
        let failed = !result.success;
        results.push(result);
        if failed {
            let skipped: Vec<String> = targets[i + 1..].iter().map(|t| t.abi.clone()).collect();
            if !skipped.is_empty() {
                warn!("skipping {} after {} failed", skipped.join(", "), target.abi);
            }
            return BuildRun { results, skipped };
        }
    }
    BuildRun {
        results,
        skipped: Vec::new(),
    }
}

fn execute_parallel(
    plan: &BuildPlan,
    catalog: &Catalog,
    toolchain: &ToolchainPath,
    job: &BuildJob,
    invoker: &dyn Invoker,
    jobs: usize,
) -> BuildRun {
    let targets = catalog.targets();
    let workers = jobs.clamp(1, targets.len().max(1));
    let next = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);
    let slots: Mutex<Vec<Option<BuildResult>>> = Mutex::new(targets.iter().map(|_| None).collect());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let i = next.fetch_add(1, Ordering::SeqCst);
                let Some(target) = targets.get(i) else {
                    break;
                };
                let result = build_one(plan, target, toolchain, job, invoker);
                if !result.success {
                    cancelled.store(true, Ordering::SeqCst);
                }
                let mut slots = slots.lock().unwrap_or_else(|e| e.into_inner());
                slots[i] = Some(result);
            });
        }
    });

    let slots = slots.into_inner().unwrap_or_else(|e| e.into_inner());
    let mut results = Vec::new();
    let mut skipped = Vec::new();
    for (target, slot) in targets.iter().zip(slots) {
        match slot {
            Some(result) => results.push(result),
            None => skipped.push(target.abi.clone()),
        }
    }
    BuildRun { results, skipped }
}

fn build_one(
    plan: &BuildPlan,
    target: &BuildTarget,
    toolchain: &ToolchainPath,
    job: &BuildJob,
    invoker: &dyn Invoker,
) -> BuildResult {
    let start = Instant::now();
    let invocation = bind(plan, target, toolchain, job);
    info!("building {} ({})", target.id(), target.arch);

    let failure = |exit_code: Option<i32>, detail: String| BuildResult {
        target: target.abi.clone(),
        arch: target.arch,
        success: false,
        artifact: None,
        exit_code,
        detail: Some(detail),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    if let Some(parent) = invocation.output.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return failure(None, format!("cannot create {}: {e}", parent.display()));
        }
    }
    if let Err(e) = remove_stale(&invocation.output) {
        return failure(
            None,
            format!("cannot remove stale {}: {e}", invocation.output.display()),
        );
    }

    let outcome = match invoker.invoke(&invocation) {
        Ok(outcome) => outcome,
        Err(e) => {
            return failure(
                None,
                format!("cannot run {}: {e}", invocation.program.display()),
            )
        }
    };

    if !outcome.success {
        let detail = if outcome.stderr_tail.is_empty() {
            match outcome.exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            outcome.stderr_tail
        };
        return failure(outcome.exit_code, detail);
    }

    if !invocation.output.is_file() {
        return failure(
            outcome.exit_code,
            format!(
                "build tool succeeded but {} was not produced",
                invocation.output.display()
            ),
        );
    }

    if let Err(e) = make_executable(&invocation.output) {
        return failure(
            outcome.exit_code,
            format!("cannot mark {} executable: {e}", invocation.output.display()),
        );
    }

    BuildResult {
        target: target.abi.clone(),
        arch: target.arch,
        success: true,
        artifact: Some(invocation.output),
        exit_code: outcome.exit_code,
        detail: None,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(path: &Path) -> std::io::Result<()> {
    fs::metadata(path).map(|_| ())
}
