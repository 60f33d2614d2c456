//! Build orchestration for abiforge.
//!
//! Turns a target catalog and a located toolchain into one artifact per ABI
//! through a fixed pipeline: plan composition, fail-fast execution, and
//! post-build artifact verification.
//!
//! The shared [`BuildPlan`] is computed once and bound to each target as an
//! [`Invocation`]; targets never share mutable state.

pub mod elf;
pub mod error;
pub mod executor;
pub mod invocation;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod verify;

pub use error::{BuildError, Result};
pub use executor::{bind, execute, BuildJob, BuildResult, BuildRun, ExecutionMode};
pub use invocation::{Invocation, InvocationOutcome, Invoker, ProcessInvoker};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineOutput};
pub use plan::{compose, BuildMode, BuildPlan, LinkMode, MIN_PAGE_SIZE};
pub use report::{sha256_hex, RunSummary, TargetRecord, TargetStatus};
pub use verify::{
    classify, ArtifactVerifier, DependencyInspector, ExecutableType, NoInspector,
    ReadelfInspector, VerificationReport, VerificationWarning, WarningKind,
};
