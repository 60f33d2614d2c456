//! Build pipeline orchestrator.
//!
//! locate toolchain -> compose plan -> execute targets -> verify artifacts.
//! Configuration errors surface before the first invocation; verification
//! runs only once every target has built.

use std::path::PathBuf;
use std::time::Instant;

use abiforge_targets::{locate, Catalog, HostDescriptor, ToolchainPath};
use log::info;

use crate::error::{BuildError, Result};
use crate::executor::{execute, BuildJob, BuildRun, ExecutionMode};
use crate::invocation::Invoker;
use crate::plan::{compose, BuildPlan, MIN_PAGE_SIZE};
use crate::report::RunSummary;
use crate::verify::{
    ArtifactVerifier, DependencyInspector, ReadelfInspector, VerificationReport,
};

/// Inputs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Toolchain root; `None` fails with `MissingConfiguration`.
    pub toolchain_root: Option<PathBuf>,
    pub host: HostDescriptor,
    /// Targets to build, in order.
    pub catalog: Catalog,
    pub tags: Vec<String>,
    pub job: BuildJob,
    pub mode: ExecutionMode,
    /// Run the artifact verifier after a successful build.
    pub verify: bool,
    /// Treat verification warnings as a run failure.
    pub strict_verify: bool,
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub toolchain: ToolchainPath,
    pub plan: BuildPlan,
    pub run: BuildRun,
    pub verification: Vec<VerificationReport>,
    pub strict_verify: bool,
    pub duration_ms: u64,
}

impl PipelineOutput {
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(&self.run, &self.plan.tags, &self.verification)
    }

    /// Map the run to an overall result: the first failed target, or in
    /// strict mode any verification warning.
    pub fn ensure_success(&self) -> Result<()> {
        self.run.ensure_success()?;
        if self.strict_verify {
            let warnings: usize = self.verification.iter().map(|r| r.warnings.len()).sum();
            if warnings > 0 {
                return Err(BuildError::VerificationFailed {
                    artifacts: self.verification.iter().filter(|r| !r.passed()).count(),
                    warnings,
                });
            }
        }
        Ok(())
    }
}

/// Run the full pipeline.
///
/// Returns `Err` only for configuration errors; target failures are
/// reported in [`PipelineOutput::run`]. Without an explicit `inspector`,
/// dependencies are read with the located toolchain's `llvm-readelf`.
pub fn run_pipeline(
    config: PipelineConfig,
    invoker: &dyn Invoker,
    inspector: Option<Box<dyn DependencyInspector>>,
) -> Result<PipelineOutput> {
    let start = Instant::now();

    let toolchain = locate(config.toolchain_root.as_deref(), &config.host)?;
    info!(
        "using toolchain {} ({})",
        toolchain.bin_dir.display(),
        toolchain.host_variant
    );

    let plan = compose(&config.tags);
    let run = execute(
        &plan,
        &config.catalog,
        &toolchain,
        &config.job,
        invoker,
        config.mode,
    );

    let mut verification = Vec::new();
    if config.verify && run.succeeded() {
        let inspector = inspector
            .unwrap_or_else(|| Box::new(ReadelfInspector::for_toolchain(&toolchain)));
        let verifier = ArtifactVerifier::new(MIN_PAGE_SIZE, inspector);
        for (result, artifact) in run.artifacts() {
            verification.push(verifier.verify_target(artifact, Some(result.arch)));
        }
    }

    Ok(PipelineOutput {
        toolchain,
        plan,
        run,
        verification,
        strict_verify: config.strict_verify,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}
